use std::io;
use std::sync::Arc;

use crate::core::{Connection, ConnectionId, Packet};

/// Notifications raised by the registry, the reader and the sender.
///
/// The host observes connection churn and incoming data only through these.
#[derive(Debug, Clone)]
pub enum Event {
    /// Raised after the connection was added to the registry
    Connected(Arc<Connection>),
    /// Raised while the connection is still listed, right before removal.
    ///
    /// Through a node's hub this arrives after the reader and sender views
    /// have dropped the connection, so `send_to` returns `None` for it. The
    /// socket itself is still open; write to it through the carried
    /// connection if a last message is needed.
    Disconnected(Arc<Connection>),
    DataReceived {
        connection: Arc<Connection>,
        packet: Packet,
    },
    /// A read outside the probe path failed. Other connections were still read.
    ReadFault {
        connection: Arc<Connection>,
        kind: io::ErrorKind,
        message: String,
    },
    /// A send failed. Other connections were still attempted.
    SendFault {
        connection: Arc<Connection>,
        kind: io::ErrorKind,
        message: String,
    },
}

impl Event {
    /// The connection this event concerns
    pub fn connection(&self) -> &Arc<Connection> {
        match self {
            Self::Connected(c) | Self::Disconnected(c) => c,
            Self::DataReceived { connection, .. }
            | Self::ReadFault { connection, .. }
            | Self::SendFault { connection, .. } => connection,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection().id()
    }

    /// Short label for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "CONNECTED",
            Self::Disconnected(_) => "DISCONNECTED",
            Self::DataReceived { .. } => "DATA_RECEIVED",
            Self::ReadFault { .. } => "READ_FAULT",
            Self::SendFault { .. } => "SEND_FAULT",
        }
    }
}
