//! # Core Types
//!
//! The two values everything else moves around.
//!
//! ## Components
//! - **Connection**: one live TCP endpoint, its peer address and liveness flag
//! - **Packet**: an immutable byte buffer plus a count of meaningful bytes
//!
//! ## Wire Format
//! There is none. Bytes go out exactly as given and come in exactly as the
//! socket delivers them; whatever is available at one moment is a packet.

pub mod connection;
pub mod packet;

pub use connection::{Connection, ConnectionId, ProbeOutcome};
pub use packet::{Packet, DEFAULT_PACKET_SIZE};
