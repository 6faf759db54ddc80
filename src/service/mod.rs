//! # Roles
//!
//! Symmetric server and client roles over one shared node core.
//!
//! ## Components
//! - **Node**: registry, detector, reader, sender and the public event hub
//! - **Wiring**: keeps the reader and sender views in step with the registry
//! - **Server**: bind + accept loop
//! - **Client**: connect
//!
//! ## Usage
//! ```rust,no_run
//! use peerlink::config::NetworkConfig;
//! use peerlink::core::Packet;
//! use peerlink::protocol::Event;
//! use peerlink::service::Server;
//! use std::time::Duration;
//!
//! # async fn run() -> peerlink::error::Result<()> {
//! let mut server = Server::bind(&NetworkConfig::default())?;
//! server.events().subscribe(|event: &Event| {
//!     if let Event::DataReceived { connection, packet } = event {
//!         println!("{} sent {} bytes", connection.id(), packet.len());
//!     }
//! });
//! server.start()?;
//!
//! loop {
//!     server.tick()?;
//!     server.send(&Packet::from(&b"heartbeat"[..]));
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//! }
//! # }
//! ```

pub mod client;
pub mod node;
pub mod server;
pub mod wiring;

pub use client::Client;
pub use node::{Node, TickReport};
pub use server::Server;
pub use wiring::Wiring;
