//! # peerlink
//!
//! A minimal bidirectional TCP transport with symmetric server and client
//! roles. It accepts or establishes connections, notices when peers go away,
//! and moves raw packets in and out of a registry of live connections.
//!
//! ## Model
//! - The host drives everything with [`Node::tick`](service::Node::tick):
//!   one disconnection-probe pass, then one read pass. Neither waits on a
//!   socket.
//! - On a server, the accept loop runs as its own task and registers each
//!   new peer as it arrives.
//! - Connection churn and incoming data are reported only through
//!   [`Event`](protocol::Event)s delivered synchronously by an
//!   [`EventHub`](protocol::EventHub).
//!
//! ## Non-goals
//! No encryption, no retransmission, no delivery guarantees beyond TCP's, and
//! no length-prefixed framing: whatever bytes are available at one moment are
//! a packet. Message boundaries are not preserved across network buffering.
//!
//! ## Example
//! ```rust,no_run
//! use peerlink::config::NetworkConfig;
//! use peerlink::core::Packet;
//! use peerlink::service::Client;
//!
//! # async fn run() -> peerlink::error::Result<()> {
//! let client = Client::connect(&NetworkConfig::default()).await?;
//! client.send(&Packet::from(&b"hello"[..]));
//! client.tick()?;
//! client.close()?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::core::{Connection, ConnectionId, Packet};
pub use crate::error::{Result, TransportError};
pub use crate::protocol::{Event, EventHub, SubscriptionId};
pub use crate::service::{Client, Server};
