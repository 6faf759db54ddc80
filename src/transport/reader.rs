//! # Packet Reader
//!
//! Drains connections with pending bytes into packets, once per tick.
//!
//! ## Framing
//! There is no length prefix. Whatever can be read without blocking in one
//! drain becomes one packet. Two policies decide what a multi-read drain
//! produces:
//! - [`FramingPolicy::LastChunk`] (default): every read lands at offset 0 of
//!   the same fixed buffer, and the packet carries that buffer plus the byte
//!   count of the final read. Earlier chunks of the drain are overwritten and
//!   lost; only payloads that fit one read arrive intact.
//! - [`FramingPolicy::Accumulate`]: every chunk of the drain is appended and
//!   the packet carries all of them. Consumers that relied on the
//!   single-chunk behavior must opt in explicitly.
//!
//! A read fault affects only the connection it happened on; the scan moves
//! on to the next connection.

use std::io;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::{TransportConfig, DEFAULT_MAX_DRAIN_READS};
use crate::core::{Connection, Packet, DEFAULT_PACKET_SIZE};
use crate::protocol::{Event, EventHub};
use crate::transport::view::ConnectionView;
use crate::utils::metrics::global_metrics;

/// How the chunks of one drain are turned into a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingPolicy {
    #[default]
    LastChunk,
    Accumulate,
}

/// Outcome of one read pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadReport {
    /// Packets emitted
    pub packets: usize,
    /// Bytes read across all connections, including overwritten chunks
    pub bytes: usize,
    /// Connections whose drain ended in a fault
    pub faults: usize,
}

enum Drain {
    Empty,
    Packet(Packet, usize),
    Fault(io::Error, Option<(Packet, usize)>),
}

#[derive(Debug)]
pub struct PacketReader {
    view: ConnectionView,
    buffer: Vec<u8>,
    framing: FramingPolicy,
    max_drain_reads: usize,
}

impl Default for PacketReader {
    fn default() -> Self {
        Self::new(DEFAULT_PACKET_SIZE, FramingPolicy::LastChunk)
    }
}

impl PacketReader {
    pub fn new(buffer_size: usize, framing: FramingPolicy) -> Self {
        Self {
            view: ConnectionView::new(),
            buffer: vec![0u8; buffer_size.max(1)],
            framing,
            max_drain_reads: DEFAULT_MAX_DRAIN_READS,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        let mut reader = Self::new(config.read_buffer_size, config.framing);
        reader.max_drain_reads = config.max_drain_reads.max(1);
        reader
    }

    /// The connection set this reader scans
    pub fn view(&self) -> &ConnectionView {
        &self.view
    }

    pub fn framing(&self) -> FramingPolicy {
        self.framing
    }

    /// Read every connection in the view once, emitting `DataReceived` on
    /// `events` for each connection that produced bytes.
    pub fn poll(&mut self, events: &EventHub<Event>) -> ReadReport {
        let mut report = ReadReport::default();

        for conn in self.view.snapshot() {
            if !conn.is_live() {
                continue;
            }

            match self.drain(&conn) {
                Drain::Empty => {}
                Drain::Packet(packet, bytes) => {
                    report.bytes += bytes;
                    report.packets += 1;
                    Self::deliver(events, &conn, packet);
                }
                Drain::Fault(e, partial) => {
                    if let Some((packet, bytes)) = partial {
                        report.bytes += bytes;
                        report.packets += 1;
                        Self::deliver(events, &conn, packet);
                    }
                    report.faults += 1;
                    warn!(conn_id = %conn.id(), peer = %conn.peer_addr(), error = %e, "Read fault");
                    global_metrics().read_fault();
                    events.emit(&Event::ReadFault {
                        connection: Arc::clone(&conn),
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        report
    }

    fn deliver(events: &EventHub<Event>, conn: &Arc<Connection>, packet: Packet) {
        trace!(conn_id = %conn.id(), bytes = packet.len(), "Packet received");
        global_metrics().packet_received(packet.len() as u64);
        events.emit(&Event::DataReceived {
            connection: Arc::clone(conn),
            packet,
        });
    }

    fn drain(&mut self, conn: &Connection) -> Drain {
        let mut last = 0usize;
        let mut total = 0usize;
        let mut accumulated = BytesMut::new();

        for _ in 0..self.max_drain_reads {
            match conn.try_read(&mut self.buffer) {
                // End of stream: the detector owns orderly closes
                Ok(0) => break,
                Ok(n) => {
                    last = n;
                    total += n;
                    if self.framing == FramingPolicy::Accumulate {
                        accumulated.extend_from_slice(&self.buffer[..n]);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let partial = (total > 0).then(|| (self.packet(last, accumulated), total));
                    return Drain::Fault(e, partial);
                }
            }
        }

        if total == 0 {
            return Drain::Empty;
        }
        if total > last && self.framing == FramingPolicy::LastChunk {
            debug!(
                conn_id = %conn.id(),
                read = total,
                kept = last,
                "Drain needed several reads; earlier chunks overwritten"
            );
        }
        Drain::Packet(self.packet(last, accumulated), total)
    }

    fn packet(&self, last: usize, accumulated: BytesMut) -> Packet {
        match self.framing {
            FramingPolicy::LastChunk => {
                Packet::with_len(Bytes::copy_from_slice(&self.buffer), last)
            }
            FramingPolicy::Accumulate => Packet::new(accumulated.freeze()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::core::connection::test_support::loopback_pair;

    fn collect(events: &EventHub<Event>) -> Arc<Mutex<Vec<Vec<u8>>>> {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&out);
        events.subscribe(move |e| {
            if let Event::DataReceived { packet, .. } = e {
                sink.lock().unwrap().push(packet.payload().to_vec());
            }
        });
        out
    }

    async fn poll_until_packet(reader: &mut PacketReader, events: &EventHub<Event>) -> ReadReport {
        for _ in 0..100 {
            let report = reader.poll(events);
            if report.packets > 0 {
                return report;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        ReadReport::default()
    }

    #[tokio::test]
    async fn small_payload_arrives_intact() {
        let events = EventHub::new();
        let received = collect(&events);
        let mut reader = PacketReader::default();
        let (conn, mut peer) = loopback_pair().await;
        reader.view().insert(&conn);

        peer.write_all(b"hello world").await.unwrap();
        let report = poll_until_packet(&mut reader, &events).await;

        assert_eq!(report.packets, 1);
        assert_eq!(*received.lock().unwrap(), vec![b"hello world".to_vec()]);
    }

    #[tokio::test]
    async fn last_chunk_policy_keeps_only_final_read() {
        let events = EventHub::new();
        let received = collect(&events);
        let mut reader = PacketReader::new(4, FramingPolicy::LastChunk);
        let (conn, mut peer) = loopback_pair().await;
        reader.view().insert(&conn);

        peer.write_all(b"abcdefghij").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let report = poll_until_packet(&mut reader, &events).await;

        assert_eq!(report.packets, 1);
        assert_eq!(report.bytes, 10);
        assert_eq!(*received.lock().unwrap(), vec![b"ij".to_vec()]);
    }

    #[tokio::test]
    async fn accumulate_policy_keeps_every_chunk() {
        let events = EventHub::new();
        let received = collect(&events);
        let mut reader = PacketReader::new(4, FramingPolicy::Accumulate);
        let (conn, mut peer) = loopback_pair().await;
        reader.view().insert(&conn);

        peer.write_all(b"abcdefghij").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        poll_until_packet(&mut reader, &events).await;

        assert_eq!(*received.lock().unwrap(), vec![b"abcdefghij".to_vec()]);
    }

    #[tokio::test]
    async fn idle_connections_emit_nothing() {
        let events = EventHub::new();
        let received = collect(&events);
        let mut reader = PacketReader::default();
        let (conn, _peer) = loopback_pair().await;
        reader.view().insert(&conn);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let report = reader.poll(&events);
        assert_eq!(report, ReadReport::default());
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn connections_outside_the_view_are_not_read() {
        let events = EventHub::new();
        let received = collect(&events);
        let mut reader = PacketReader::default();
        let (conn, mut peer) = loopback_pair().await;
        reader.view().insert(&conn);
        reader.view().remove(&conn);

        peer.write_all(b"ignored").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        reader.poll(&events);
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    #[allow(deprecated)]
    async fn reset_peer_raises_read_fault_without_blocking_others() {
        let events = EventHub::new();
        let received = collect(&events);
        let faults = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&faults);
        events.subscribe(move |e| {
            if let Event::ReadFault {
                connection, kind, ..
            } = e
            {
                sink.lock().unwrap().push((connection.id(), *kind));
            }
        });

        let mut reader = PacketReader::default();
        let (broken, reset) = loopback_pair().await;
        let (healthy, mut talker) = loopback_pair().await;
        reader.view().insert(&broken);
        reader.view().insert(&healthy);

        reset.set_linger(Some(Duration::ZERO)).unwrap();
        drop(reset);
        talker.write_all(b"still here").await.unwrap();

        let mut total = ReadReport::default();
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let report = reader.poll(&events);
            total.packets += report.packets;
            total.faults += report.faults;
            if total.faults > 0 && total.packets > 0 {
                break;
            }
        }

        assert_eq!(total.faults, 1);
        assert_eq!(
            *faults.lock().unwrap(),
            vec![(broken.id(), io::ErrorKind::ConnectionReset)]
        );
        assert_eq!(*received.lock().unwrap(), vec![b"still here".to_vec()]);
        // The reader leaves removal to the detector
        assert!(broken.is_live());
    }
}
