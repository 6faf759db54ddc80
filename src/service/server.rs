//! # Server Role
//!
//! Binds a listening socket with a fixed backlog and admits peers through the
//! accept loop. Everything else (ticking, sending, events) is the shared
//! [`Node`] behavior, reachable through `Deref`.

use std::net::SocketAddr;
use std::ops::Deref;

use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tracing::{info, instrument, warn};

use crate::config::{NetworkConfig, LISTEN_BACKLOG};
use crate::error::{Result, TransportError};
use crate::service::node::Node;
use crate::transport::accept::{self, AcceptHandle, AcceptState};

#[derive(Debug)]
pub struct Server {
    node: Node,
    local_addr: SocketAddr,
    listener: Option<TcpListener>,
    accept: Option<AcceptHandle>,
}

impl Server {
    /// Bind the configured address. Must be called within a tokio runtime.
    #[instrument(skip(config), fields(address = %config.server.address))]
    pub fn bind(config: &NetworkConfig) -> Result<Self> {
        config.validate_strict()?;
        let addr: SocketAddr = config.server.address.parse().map_err(|e| {
            TransportError::ConfigError(format!(
                "Invalid server address '{}': {e}",
                config.server.address
            ))
        })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.bind(addr)?;
        let listener = socket.listen(LISTEN_BACKLOG)?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, backlog = LISTEN_BACKLOG, "Listening");

        Ok(Self {
            node: Node::new(&config.transport),
            local_addr,
            listener: Some(listener),
            accept: None,
        })
    }

    /// The bound address, with the real port if port 0 was requested
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wire the node and start the accept loop.
    ///
    /// If the node cannot start, the listener is kept and `start` may be
    /// retried.
    #[instrument(skip(self), fields(address = %self.local_addr))]
    pub fn start(&mut self) -> Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or(TransportError::ListenerUnavailable)?;
        if let Err(e) = self.node.start() {
            self.listener = Some(listener);
            return Err(e);
        }
        self.accept = Some(accept::spawn_incoming(
            TcpListenerStream::new(listener),
            self.local_addr,
            self.node.registry().clone(),
        ));
        Ok(())
    }

    /// Current accept loop state, `None` before `start`
    pub fn accept_state(&self) -> Option<AcceptState> {
        self.accept.as_ref().map(AcceptHandle::state)
    }

    /// Watch accept loop transitions, e.g. to react to a terminal failure
    pub fn subscribe_accept_state(&self) -> Option<watch::Receiver<AcceptState>> {
        self.accept.as_ref().map(AcceptHandle::subscribe_state)
    }

    /// Stop accepting, detach the wiring and release every connection.
    ///
    /// The listener is closed once the accept loop exits. If the loop had
    /// failed earlier, that failure is returned after teardown completes.
    #[instrument(skip(self), fields(address = %self.local_addr))]
    pub async fn stop(&mut self) -> Result<()> {
        let accept_result = match self.accept.take() {
            Some(handle) => handle.stop().await,
            None => Ok(()),
        };
        if let Err(e) = &accept_result {
            warn!(error = %e, "Accept loop had terminated with an error");
        }
        self.node.stop()?;
        accept_result
    }
}

impl Deref for Server {
    type Target = Node;

    fn deref(&self) -> &Self::Target {
        &self.node
    }
}
