//! # Packet Sender
//!
//! Broadcasts a packet to every connection in the sender's view.
//!
//! - [`PacketSender::send`] attempts one non-blocking write per connection.
//!   A write that does not take the whole payload is a fault; nothing is
//!   retried.
//! - [`PacketSender::send_async`] drives one send future per connection
//!   concurrently. Completion order across connections is unspecified.
//!
//! In both modes a fault on one connection never stops the others from being
//! attempted. Faults are reported in the returned [`BroadcastReport`] and
//! raised as [`Event::SendFault`].

use std::io;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{trace, warn};

use crate::core::{Connection, ConnectionId, Packet};
use crate::error::TransportError;
use crate::protocol::{Event, EventHub};
use crate::transport::view::ConnectionView;
use crate::utils::metrics::global_metrics;

/// A send that failed on one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub connection: ConnectionId,
    pub kind: io::ErrorKind,
    pub message: String,
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections a send was attempted on
    pub attempted: usize,
    /// Connections the whole payload was written to, in attempt order
    pub delivered: Vec<ConnectionId>,
    pub failed: Vec<SendFailure>,
}

impl BroadcastReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.delivered.len() == self.attempted
    }
}

#[derive(Debug, Default)]
pub struct PacketSender {
    view: ConnectionView,
}

impl PacketSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// The connection set this sender broadcasts to
    pub fn view(&self) -> &ConnectionView {
        &self.view
    }

    /// Synchronous broadcast: one non-blocking write per connection
    pub fn send(&self, packet: &Packet, events: &EventHub<Event>) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for conn in self.view.snapshot().iter().filter(|c| c.is_live()) {
            report.attempted += 1;
            let result = conn.send_now(packet.payload()).map(|_| ());
            Self::record(&mut report, conn, result, packet.len(), events);
        }
        report
    }

    /// Asynchronous broadcast: every connection's send runs concurrently
    pub async fn send_async(&self, packet: &Packet, events: &EventHub<Event>) -> BroadcastReport {
        let targets: Vec<Arc<Connection>> = self
            .view
            .snapshot()
            .into_iter()
            .filter(|c| c.is_live())
            .collect();
        let payload = packet.to_bytes();

        let results = join_all(targets.iter().map(|conn| {
            let payload = payload.clone();
            async move { conn.send(&payload).await.map_err(TransportError::from) }
        }))
        .await;

        let mut report = BroadcastReport {
            attempted: targets.len(),
            ..Default::default()
        };
        for (conn, result) in targets.iter().zip(results) {
            Self::record(&mut report, conn, result, packet.len(), events);
        }
        report
    }

    /// Send to a single connection of the view.
    ///
    /// Returns `None` if no live connection with that id is in the view.
    pub fn send_to(
        &self,
        id: ConnectionId,
        packet: &Packet,
        events: &EventHub<Event>,
    ) -> Option<BroadcastReport> {
        let conn = self.view.find(id).filter(|c| c.is_live())?;
        let mut report = BroadcastReport {
            attempted: 1,
            ..Default::default()
        };
        let result = conn.send_now(packet.payload()).map(|_| ());
        Self::record(&mut report, &conn, result, packet.len(), events);
        Some(report)
    }

    fn record(
        report: &mut BroadcastReport,
        conn: &Arc<Connection>,
        result: Result<(), TransportError>,
        len: usize,
        events: &EventHub<Event>,
    ) {
        match result {
            Ok(()) => {
                trace!(conn_id = %conn.id(), bytes = len, "Packet sent");
                global_metrics().packet_sent(len as u64);
                report.delivered.push(conn.id());
            }
            Err(e) => {
                let kind = e.io_kind().unwrap_or(io::ErrorKind::Other);
                warn!(conn_id = %conn.id(), peer = %conn.peer_addr(), error = %e, "Send fault");
                global_metrics().send_fault();
                report.failed.push(SendFailure {
                    connection: conn.id(),
                    kind,
                    message: e.to_string(),
                });
                events.emit(&Event::SendFault {
                    connection: Arc::clone(conn),
                    kind,
                    message: e.to_string(),
                });
            }
        }
    }
}
