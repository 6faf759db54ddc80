//! Observability and Metrics
//!
//! Process-wide counters for connection churn and packet traffic.
//!
//! Uses atomic counters for thread-safe metrics collection; the accept loop
//! may record from a different worker thread than the tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Global metrics collector for transport operations
#[derive(Debug)]
pub struct Metrics {
    /// Connections admitted by an accept loop
    pub connections_accepted: AtomicU64,
    /// Connections established by a client
    pub connections_opened: AtomicU64,
    /// Orderly closes observed by the detector
    pub graceful_closes: AtomicU64,
    /// Probes that faulted and were left for the next tick
    pub probes_inconclusive: AtomicU64,
    /// Packets emitted by the reader
    pub packets_received: AtomicU64,
    /// Bytes read by the reader
    pub bytes_received: AtomicU64,
    /// Per-connection sends that completed
    pub packets_sent: AtomicU64,
    /// Bytes written by the sender
    pub bytes_sent: AtomicU64,
    /// Read faults outside the probe path
    pub read_faults: AtomicU64,
    /// Send faults
    pub send_faults: AtomicU64,
    /// Terminal accept failures
    pub accept_faults: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_accepted: AtomicU64::new(0),
            connections_opened: AtomicU64::new(0),
            graceful_closes: AtomicU64::new(0),
            probes_inconclusive: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            read_faults: AtomicU64::new(0),
            send_faults: AtomicU64::new(0),
            accept_faults: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn graceful_close(&self) {
        self.graceful_closes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn probe_inconclusive(&self) {
        self.probes_inconclusive.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet handed to subscribers
    pub fn packet_received(&self, byte_count: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record one completed per-connection send
    pub fn packet_sent(&self, byte_count: u64) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn read_fault(&self) {
        self.read_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn send_fault(&self) {
        self.send_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accept_fault(&self) {
        self.accept_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            graceful_closes: self.graceful_closes.load(Ordering::Relaxed),
            probes_inconclusive: self.probes_inconclusive.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            read_faults: self.read_faults.load(Ordering::Relaxed),
            send_faults: self.send_faults.load(Ordering::Relaxed),
            accept_faults: self.accept_faults.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_accepted = snapshot.connections_accepted,
            connections_opened = snapshot.connections_opened,
            graceful_closes = snapshot.graceful_closes,
            probes_inconclusive = snapshot.probes_inconclusive,
            packets_received = snapshot.packets_received,
            bytes_received = snapshot.bytes_received,
            packets_sent = snapshot.packets_sent,
            bytes_sent = snapshot.bytes_sent,
            read_faults = snapshot.read_faults,
            send_faults = snapshot.send_faults,
            accept_faults = snapshot.accept_faults,
            uptime_seconds = snapshot.uptime_seconds,
            "Transport metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub connections_accepted: u64,
    pub connections_opened: u64,
    pub graceful_closes: u64,
    pub probes_inconclusive: u64,
    pub packets_received: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub read_faults: u64,
    pub send_faults: u64,
    pub accept_faults: u64,
    pub uptime_seconds: u64,
}

/// Global metrics instance (lazy static for simplicity)
static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}
