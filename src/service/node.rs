//! The role-independent core shared by [`Server`](super::Server) and
//! [`Client`](super::Client).
//!
//! A node owns the registry, the detector, the reader and the sender, plus the
//! public event hub the host subscribes to. `start` wires everything up and
//! enables ticking; `stop` detaches every subscription and then releases the
//! connections.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, instrument};

use crate::config::TransportConfig;
use crate::core::{Connection, ConnectionId, Packet};
use crate::error::{Result, TransportError};
use crate::protocol::{Event, EventHub};
use crate::service::wiring::Wiring;
use crate::transport::{
    BroadcastReport, ConnectionRegistry, ConnectionView, DetectionReport, DisconnectionDetector,
    PacketReader, PacketSender, ReadReport,
};

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub detection: DetectionReport,
    pub read: ReadReport,
}

#[derive(Debug)]
pub struct Node {
    registry: Arc<ConnectionRegistry>,
    events: Arc<EventHub<Event>>,
    detector: Mutex<DisconnectionDetector>,
    reader: Mutex<PacketReader>,
    reader_view: ConnectionView,
    sender: PacketSender,
    wiring: Mutex<Option<Wiring>>,
}

impl Node {
    pub fn new(config: &TransportConfig) -> Self {
        let reader = PacketReader::from_config(config);
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            events: Arc::new(EventHub::new()),
            detector: Mutex::new(DisconnectionDetector::new(config.probe_size)),
            reader_view: reader.view().clone(),
            reader: Mutex::new(reader),
            sender: PacketSender::new(),
            wiring: Mutex::new(None),
        }
    }

    /// Hub for `Connected`, `Disconnected`, `DataReceived` and fault events
    pub fn events(&self) -> &Arc<EventHub<Event>> {
        &self.events
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Snapshot of the registered connections
    pub fn connections(&self) -> Result<Vec<Arc<Connection>>> {
        self.registry.snapshot()
    }

    // Held outside the reader's lock so handlers running during a read pass can use it
    pub fn reader_view(&self) -> &ConnectionView {
        &self.reader_view
    }

    pub fn sender_view(&self) -> &ConnectionView {
        self.sender.view()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.wiring).map(|w| w.is_some()).unwrap_or(false)
    }

    /// Attach the wiring and enable ticking
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<()> {
        let mut wiring = lock(&self.wiring)?;
        if wiring.is_some() {
            return Err(TransportError::AlreadyRunning);
        }
        *wiring = Some(Wiring::attach(
            &self.registry,
            &[&self.reader_view, self.sender.view()],
            &self.events,
        )?);
        info!("Node started");
        Ok(())
    }

    /// Detach all subscriptions, then release every connection.
    ///
    /// Connections are dropped without `Disconnected` notifications since no
    /// subscriber is attached any more. Returns how many were released.
    #[instrument(skip(self))]
    pub fn stop(&self) -> Result<usize> {
        let wiring = lock(&self.wiring)?.take().ok_or(TransportError::NotRunning)?;
        wiring.detach(&self.registry);
        let released = self.registry.clear_silently()?.len();
        info!(released, "Node stopped");
        Ok(released)
    }

    /// One detection pass followed by one read pass
    pub fn tick(&self) -> Result<TickReport> {
        if !self.is_running() {
            return Err(TransportError::NotRunning);
        }
        let detection = lock(&self.detector)?.scan(&self.registry)?;
        let read = lock(&self.reader)?.poll(&self.events);
        if !detection.closed.is_empty() || read.faults > 0 {
            debug!(
                closed = detection.closed.len(),
                packets = read.packets,
                read_faults = read.faults,
                "Tick completed"
            );
        }
        Ok(TickReport { detection, read })
    }

    /// Synchronous broadcast to every connection
    pub fn send(&self, packet: &Packet) -> BroadcastReport {
        self.sender.send(packet, &self.events)
    }

    /// Concurrent broadcast to every connection
    pub async fn send_async(&self, packet: &Packet) -> BroadcastReport {
        self.sender.send_async(packet, &self.events).await
    }

    /// Unicast to one connection; `None` if it is not registered
    pub fn send_to(&self, id: ConnectionId, packet: &Packet) -> Option<BroadcastReport> {
        self.sender.send_to(id, packet, &self.events)
    }

    /// Explicitly remove a connection, raising `Disconnected`
    pub fn disconnect(&self, id: ConnectionId) -> Result<bool> {
        Ok(self.registry.remove_by_id(id)?.is_some())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| TransportError::LockPoisoned)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::core::connection::test_support::loopback_pair;

    #[test]
    fn tick_requires_start() {
        let node = Node::new(&TransportConfig::default());
        assert!(matches!(node.tick(), Err(TransportError::NotRunning)));
        assert!(matches!(node.stop(), Err(TransportError::NotRunning)));
    }

    #[test]
    fn start_twice_is_rejected() {
        let node = Node::new(&TransportConfig::default());
        node.start().unwrap();
        assert!(matches!(node.start(), Err(TransportError::AlreadyRunning)));
        assert!(node.is_running());
    }

    #[tokio::test]
    async fn stop_detaches_everything_and_releases_connections() {
        let node = Node::new(&TransportConfig::default());
        node.start().unwrap();
        let (a, _pa) = loopback_pair().await;
        node.registry().add(a.clone()).unwrap();
        assert_eq!(node.sender_view().len(), 1);

        assert_eq!(node.stop().unwrap(), 1);
        assert_eq!(node.registry().events().subscriber_count(), 0);
        assert!(node.sender_view().is_empty());
        assert!(node.reader_view().is_empty());
        assert!(!a.is_live());
        assert!(!node.is_running());

        // Restart wires up again from scratch
        node.start().unwrap();
        assert_eq!(node.registry().events().subscriber_count(), 3);
    }

    #[tokio::test]
    async fn disconnect_raises_event_and_updates_views() {
        let node = Node::new(&TransportConfig::default());
        node.start().unwrap();
        let (a, _pa) = loopback_pair().await;
        node.registry().add(a.clone()).unwrap();

        let fired = Arc::new(Mutex::new(Vec::new()));
        let f = Arc::clone(&fired);
        node.events().subscribe(move |e: &Event| f.lock().unwrap().push(e.name()));

        assert!(node.disconnect(a.id()).unwrap());
        assert!(!node.disconnect(a.id()).unwrap());
        assert_eq!(*fired.lock().unwrap(), vec!["DISCONNECTED"]);
        assert!(node.sender_view().is_empty());
    }

    #[tokio::test]
    async fn host_can_disconnect_from_connected_handler() {
        let node = Arc::new(Node::new(&TransportConfig::default()));
        node.start().unwrap();

        let weak = Arc::downgrade(&node);
        node.events().subscribe(move |e: &Event| {
            if let (Event::Connected(conn), Some(node)) = (e, weak.upgrade()) {
                node.disconnect(conn.id()).unwrap();
            }
        });

        let (a, _pa) = loopback_pair().await;
        assert!(node.registry().add(a.clone()).unwrap());

        assert!(node.registry().is_empty().unwrap());
        assert!(node.reader_view().is_empty());
        assert!(node.sender_view().is_empty());
        assert!(!a.is_live());
    }

    #[tokio::test]
    async fn disconnected_handler_writes_through_the_connection() {
        let node = Arc::new(Node::new(&TransportConfig::default()));
        node.start().unwrap();
        let (a, mut pa) = loopback_pair().await;
        node.registry().add(a.clone()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (weak, sink) = (Arc::downgrade(&node), Arc::clone(&seen));
        node.events().subscribe(move |e: &Event| {
            if let (Event::Disconnected(conn), Some(node)) = (e, weak.upgrade()) {
                let via_view = node.send_to(conn.id(), &Packet::from(&b"x"[..]));
                let direct = conn.send_now(b"bye").is_ok();
                sink.lock().unwrap().push((via_view.is_none(), direct));
            }
        });

        assert!(node.disconnect(a.id()).unwrap());
        assert_eq!(*seen.lock().unwrap(), vec![(true, true)]);

        drop(a);
        let mut buf = Vec::new();
        pa.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"bye");
    }
}
