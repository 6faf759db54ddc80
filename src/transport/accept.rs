//! # Accept Loop
//!
//! A single task that keeps exactly one accept in flight while running:
//! `Idle → Pending → Idle → …`. Each accepted stream is wrapped in a
//! [`Connection`] and registered before the next accept is issued.
//!
//! Stopping is a normal termination signalled through the shutdown channel.
//! An accept error is terminal: the loop records it, publishes
//! [`AcceptState::Failed`] and returns the error to whoever owns the
//! [`AcceptHandle`]. It never re-arms after a failure. A registration
//! failure ends the loop the same way.
//!
//! Each accepted stream is registered only once the reactor has seen it
//! writable, so synchronous sends work from the very first `Connected`
//! notification.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::core::Connection;
use crate::error::{Result, TransportError};
use crate::transport::registry::ConnectionRegistry;
use crate::utils::metrics::global_metrics;

/// Observable state of the accept loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptState {
    Idle,
    Pending,
    Stopped,
    Failed,
}

/// Owner side of a running accept loop
#[derive(Debug)]
pub struct AcceptHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    state: watch::Receiver<AcceptState>,
    task: JoinHandle<Result<()>>,
}

impl AcceptHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> AcceptState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition
    pub fn subscribe_state(&self) -> watch::Receiver<AcceptState> {
        self.state.clone()
    }

    /// True once the loop has exited, either stopped or failed
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal shutdown and wait for the loop to exit.
    ///
    /// Returns the accept error if the loop had already failed.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            // The loop may already be gone after a failure
            let _ = tx.send(());
        }
        self.task
            .await
            .map_err(|e| TransportError::TaskJoin(e.to_string()))?
    }
}

/// Spawn the accept loop for `listener` on the current tokio runtime
pub fn spawn(listener: TcpListener, registry: Arc<ConnectionRegistry>) -> Result<AcceptHandle> {
    let local_addr = listener.local_addr()?;
    Ok(spawn_incoming(
        TcpListenerStream::new(listener),
        local_addr,
        registry,
    ))
}

/// Spawn the accept loop over any stream of incoming connections.
///
/// The first `Err` item is terminal. The end of the stream is treated as a
/// normal stop.
pub fn spawn_incoming<S>(
    incoming: S,
    local_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
) -> AcceptHandle
where
    S: Stream<Item = io::Result<TcpStream>> + Send + Unpin + 'static,
{
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let (state_tx, state_rx) = watch::channel(AcceptState::Idle);

    let task = tokio::spawn(run(incoming, local_addr, registry, shutdown_rx, state_tx));

    AcceptHandle {
        local_addr,
        shutdown: Some(shutdown_tx),
        state: state_rx,
        task,
    }
}

#[instrument(skip_all, fields(local = %local_addr))]
async fn run<S>(
    mut incoming: S,
    local_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    mut shutdown: oneshot::Receiver<()>,
    state: watch::Sender<AcceptState>,
) -> Result<()>
where
    S: Stream<Item = io::Result<TcpStream>> + Unpin,
{
    info!("Accept loop started");

    loop {
        state.send_replace(AcceptState::Pending);

        let next = tokio::select! {
            // Also fires if the handle was dropped without stopping
            _ = &mut shutdown => {
                state.send_replace(AcceptState::Stopped);
                info!("Accept loop stopped");
                return Ok(());
            }
            next = incoming.next() => next,
        };

        let result = match next {
            Some(Ok(stream)) => {
                state.send_replace(AcceptState::Idle);
                admit(stream, &registry).await
            }
            Some(Err(e)) => Err(TransportError::Accept(e)),
            None => {
                state.send_replace(AcceptState::Stopped);
                info!("Incoming stream ended");
                return Ok(());
            }
        };

        if let Err(e) = result {
            state.send_replace(AcceptState::Failed);
            global_metrics().accept_fault();
            error!(error = %e, "Accept loop failed; it will not re-arm");
            return Err(e);
        }
    }
}

// Per-stream problems drop that stream only; registry errors are terminal.
async fn admit(stream: TcpStream, registry: &ConnectionRegistry) -> Result<()> {
    let peer = match stream.peer_addr() {
        Ok(peer) => peer,
        Err(e) => {
            warn!(error = %e, "Accepted stream has no peer address; dropped");
            return Ok(());
        }
    };
    global_metrics().connection_accepted();
    debug!(peer = %peer, "Accepted connection");

    if let Err(e) = stream.set_nodelay(true) {
        warn!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
    }
    if let Err(e) = stream.writable().await {
        warn!(peer = %peer, error = %e, "Accepted stream never became writable; dropped");
        return Ok(());
    }

    registry.add(Arc::new(Connection::with_peer(stream, peer)))?;
    Ok(())
}
