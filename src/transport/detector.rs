//! # Disconnection Detector
//!
//! Polls every registered connection once per tick with a non-destructive
//! peek.
//!
//! Detection is two-tier. A probe that completes with zero bytes means the
//! peer closed in an orderly way, and the connection is removed here. A probe
//! that faults (reset, transient error) is inconclusive and the connection is
//! left for the next tick; abrupt disconnects surface through read and send
//! faults instead.

use tracing::{debug, info, trace};

use crate::config::DEFAULT_PROBE_SIZE;
use crate::core::{ConnectionId, ProbeOutcome};
use crate::error::Result;
use crate::transport::registry::ConnectionRegistry;
use crate::utils::metrics::global_metrics;

/// Outcome of one detection pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionReport {
    /// Connections probed in this pass
    pub probed: usize,
    /// Connections removed after an orderly close, in scan order
    pub closed: Vec<ConnectionId>,
    /// Probes that faulted and were left alone
    pub inconclusive: usize,
}

#[derive(Debug)]
pub struct DisconnectionDetector {
    probe: Vec<u8>,
}

impl Default for DisconnectionDetector {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_SIZE)
    }
}

impl DisconnectionDetector {
    /// `probe_size` is clamped to at least one byte
    pub fn new(probe_size: usize) -> Self {
        Self {
            probe: vec![0u8; probe_size.max(1)],
        }
    }

    /// Run one detection pass over a snapshot of `registry`.
    ///
    /// Removals during the pass do not affect which entries are visited.
    pub fn scan(&mut self, registry: &ConnectionRegistry) -> Result<DetectionReport> {
        let snapshot = registry.snapshot()?;
        let mut report = DetectionReport::default();

        for conn in snapshot.iter().filter(|c| c.is_live()) {
            report.probed += 1;
            match conn.probe(&mut self.probe) {
                ProbeOutcome::Closed => {
                    info!(conn_id = %conn.id(), peer = %conn.peer_addr(), "Peer closed connection");
                    global_metrics().graceful_close();
                    if registry.remove(conn)? {
                        report.closed.push(conn.id());
                    }
                }
                ProbeOutcome::Fault(e) => {
                    debug!(conn_id = %conn.id(), error = %e, "Probe inconclusive");
                    global_metrics().probe_inconclusive();
                    report.inconclusive += 1;
                }
                ProbeOutcome::Pending(n) => {
                    trace!(conn_id = %conn.id(), pending = n, "Probe saw pending bytes");
                }
                ProbeOutcome::Idle => {}
            }
        }

        Ok(report)
    }
}
