//! # Client Role
//!
//! Establishes one outbound connection and registers it. From then on the
//! client behaves exactly like a server with a single peer: the same tick,
//! the same events, the same send operations.

use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::{info, instrument, warn};

use crate::config::NetworkConfig;
use crate::core::Connection;
use crate::error::{Result, TransportError};
use crate::service::node::Node;
use crate::utils::metrics::global_metrics;

#[derive(Debug)]
pub struct Client {
    node: Node,
    connection: Arc<Connection>,
}

impl Client {
    /// Connect to the configured server address and start the node
    #[instrument(skip(config), fields(address = %config.client.address))]
    pub async fn connect(config: &NetworkConfig) -> Result<Self> {
        config.validate_strict()?;
        let addr: SocketAddr = config.client.address.parse().map_err(|e| {
            TransportError::ConfigError(format!(
                "Invalid client address '{}': {e}",
                config.client.address
            ))
        })?;

        let stream = tokio::time::timeout(config.client.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::ConnectTimeout)??;
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "Failed to set TCP_NODELAY");
        }

        let connection = Arc::new(Connection::with_peer(stream, addr));
        global_metrics().connection_opened();
        info!(conn_id = %connection.id(), peer = %addr, "Connected");

        let node = Node::new(&config.transport);
        node.start()?;
        node.registry().add(Arc::clone(&connection))?;

        Ok(Self { node, connection })
    }

    /// The outbound connection, even after it was removed
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// True while the connection is still registered
    pub fn is_connected(&self) -> bool {
        self.connection.is_live()
    }

    /// Remove the connection (raising `Disconnected`), stop the node and
    /// close the socket.
    ///
    /// The socket closes once the last clone of the connection is dropped, so
    /// handlers should not hold on to it.
    #[instrument(skip(self), fields(conn_id = %self.connection.id()))]
    pub fn close(self) -> Result<()> {
        self.node.registry().remove(&self.connection)?;
        match self.node.stop() {
            Ok(_) | Err(TransportError::NotRunning) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Deref for Client {
    type Target = Node;

    fn deref(&self) -> &Self::Target {
        &self.node
    }
}
