//! # Transport Layer
//!
//! The connection lifecycle and packet pipeline.
//!
//! ## Components
//! - **Registry**: ordered, duplicate-free set of live connections
//! - **Accept**: self-re-arming accept task (server role)
//! - **Detector**: per-tick peek probe that removes gracefully closed peers
//! - **Reader**: per-tick drain of pending bytes into packets
//! - **Sender**: broadcast of a packet to every connection
//! - **View**: the reader's and sender's notification-synced connection lists
//!
//! Everything except the accept task runs on the caller's thread and never
//! waits on a socket.

pub mod accept;
pub mod detector;
pub mod reader;
pub mod registry;
pub mod sender;
pub mod view;

pub use accept::{AcceptHandle, AcceptState};
pub use detector::{DetectionReport, DisconnectionDetector};
pub use reader::{FramingPolicy, PacketReader, ReadReport};
pub use registry::ConnectionRegistry;
pub use sender::{BroadcastReport, PacketSender, SendFailure};
pub use view::ConnectionView;
