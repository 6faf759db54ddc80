//! A single live TCP endpoint tracked by the registry.
//!
//! Every operation used on the tick path is a non-blocking attempt: it either
//! completes immediately or reports that the socket is not ready. Only
//! [`Connection::send`] suspends, and only the future that issued it.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use futures::FutureExt;
use tokio::net::TcpStream;

use crate::error::{Result, TransportError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Result of a non-destructive peek
#[derive(Debug)]
pub enum ProbeOutcome {
    /// Bytes are waiting in the receive buffer
    Pending(usize),
    /// Nothing to observe right now
    Idle,
    /// The peer performed an orderly close
    Closed,
    /// The probe itself failed; says nothing definite about the peer
    Fault(io::Error),
}

/// One live transport endpoint plus its address
pub struct Connection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    stream: TcpStream,
    live: AtomicBool,
    detaching: AtomicBool,
    opened_at: Instant,
}

impl Connection {
    /// Wrap an established stream
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        let peer_addr = stream.peer_addr()?;
        Ok(Self::with_peer(stream, peer_addr))
    }

    /// Wrap an established stream whose peer address is already known
    pub fn with_peer(stream: TcpStream, peer_addr: SocketAddr) -> Self {
        Self {
            id: ConnectionId::next(),
            peer_addr,
            stream,
            live: AtomicBool::new(true),
            detaching: AtomicBool::new(false),
            opened_at: Instant::now(),
        }
    }

    #[inline]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    #[inline]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    /// False once the connection has been removed from its registry
    #[inline]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub(crate) fn mark_closed(&self) {
        self.detaching.store(true, Ordering::Release);
        self.live.store(false, Ordering::Release);
    }

    /// Claim the removal of this connection. Only the first caller gets true.
    pub(crate) fn begin_detach(&self) -> bool {
        !self.detaching.swap(true, Ordering::AcqRel)
    }

    /// True once a removal has been claimed, even while `Disconnected` is
    /// still being delivered
    pub(crate) fn is_detaching(&self) -> bool {
        self.detaching.load(Ordering::Acquire)
    }

    pub fn age(&self) -> std::time::Duration {
        self.opened_at.elapsed()
    }

    /// Peek into `buf` without consuming anything from the stream.
    ///
    /// The peek future is polled exactly once, so the caller never waits.
    /// `buf` must not be empty, otherwise every probe reads zero bytes and
    /// would be mistaken for a close.
    pub fn probe(&self, buf: &mut [u8]) -> ProbeOutcome {
        debug_assert!(!buf.is_empty(), "probe buffer must not be empty");
        match self.stream.peek(buf).now_or_never() {
            None => ProbeOutcome::Idle,
            Some(Ok(0)) => ProbeOutcome::Closed,
            Some(Ok(n)) => ProbeOutcome::Pending(n),
            Some(Err(e)) if e.kind() == io::ErrorKind::WouldBlock => ProbeOutcome::Idle,
            Some(Err(e)) => ProbeOutcome::Fault(e),
        }
    }

    /// Non-blocking read. `WouldBlock` means no bytes are available.
    pub fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.try_read(buf)
    }

    /// Non-blocking send of the whole buffer in one call.
    ///
    /// A short write is reported as [`TransportError::PartialSend`]; the
    /// remainder is not retried. The write relies on readiness the reactor
    /// has already recorded: accepted and connected streams are writable from
    /// registration on, so `WouldBlock` here means the send buffer is full.
    pub fn send_now(&self, bytes: &[u8]) -> Result<usize> {
        let written = self.stream.try_write(bytes)?;
        if written < bytes.len() {
            return Err(TransportError::PartialSend {
                written,
                expected: bytes.len(),
            });
        }
        Ok(written)
    }

    /// Wait until the socket reports writability
    pub async fn writable(&self) -> io::Result<()> {
        self.stream.writable().await
    }

    /// Send the whole buffer, waiting for writability as needed
    pub async fn send(&self, bytes: &[u8]) -> io::Result<()> {
        let mut offset = 0;
        while offset < bytes.len() {
            self.stream.writable().await?;
            match self.stream.try_write(&bytes[offset..]) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => offset += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use tokio::net::{TcpListener, TcpStream};

    use super::Connection;

    /// A registered-side connection and the raw peer stream talking to it
    pub(crate) async fn loopback_pair() -> (Arc<Connection>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (peer, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (stream, _) = accepted.unwrap();
        // Same priming the accept loop does before registering
        stream.writable().await.unwrap();
        (Arc::new(Connection::new(stream).unwrap()), peer.unwrap())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::test_support::loopback_pair;
    use super::*;

    async fn probe_until(conn: &Connection, want: fn(&ProbeOutcome) -> bool) -> bool {
        let mut buf = [0u8; 1];
        for _ in 0..100 {
            if want(&conn.probe(&mut buf)) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let (a, _pa) = loopback_pair().await;
        let (b, _pb) = loopback_pair().await;
        assert_ne!(a.id(), b.id());
        assert!(a.is_live());
    }

    #[tokio::test]
    async fn probe_sees_pending_bytes_without_consuming() {
        let (conn, mut peer) = loopback_pair().await;
        peer.write_all(b"hello").await.unwrap();

        assert!(probe_until(&conn, |o| matches!(o, ProbeOutcome::Pending(_))).await);

        let mut buf = [0u8; 16];
        let n = conn.try_read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[tokio::test]
    async fn probe_reports_orderly_close() {
        let (conn, peer) = loopback_pair().await;
        drop(peer);
        assert!(probe_until(&conn, |o| matches!(o, ProbeOutcome::Closed)).await);
    }

    #[tokio::test]
    async fn send_now_writes_whole_small_buffer() {
        let (conn, _peer) = loopback_pair().await;
        assert_eq!(conn.send_now(b"ping").unwrap(), 4);
    }
}
