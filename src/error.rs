//! # Error Types
//!
//! Error handling for the transport layer.
//!
//! Most socket faults never reach the caller: probe faults are retried on the
//! next tick, and read/send faults are isolated to the offending connection and
//! surfaced as events. The variants here cover what does propagate: accept
//! failures, registry misuse, lifecycle misuse and configuration problems.
//!
//! ## Example Usage
//! ```rust
//! use peerlink::error::{Result, TransportError};
//! use tracing::error;
//!
//! fn pick(index: usize, len: usize) -> Result<usize> {
//!     if index >= len {
//!         return Err(TransportError::OutOfRange { index, len });
//!     }
//!     Ok(index)
//! }
//!
//! if let Err(e) = pick(3, 2) {
//!     error!(error = %e, "Lookup failed");
//! }
//! ```

use std::io;
use thiserror::Error;

// TransportError is the primary error type for all transport operations
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The listening endpoint failed while an accept was pending. Terminal.
    #[error("Accept failed: {0}")]
    Accept(#[source] io::Error),

    #[error("Index {index} out of range for registry of length {len}")]
    OutOfRange { index: usize, len: usize },

    #[error("Partial send: wrote {written} of {expected} bytes")]
    PartialSend { written: usize, expected: usize },

    #[error("Node is not running")]
    NotRunning,

    #[error("Node is already running")]
    AlreadyRunning,

    #[error("Listener already consumed or closed")]
    ListenerUnavailable,

    #[error("Connection attempt timed out")]
    ConnectTimeout,

    #[error("Synchronization primitive poisoned")]
    LockPoisoned,

    #[error("Background task failed: {0}")]
    TaskJoin(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl TransportError {
    /// The underlying I/O error kind, if this error wraps one.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io(e) | Self::Accept(e) => Some(e.kind()),
            Self::PartialSend { .. } => Some(io::ErrorKind::WriteZero),
            _ => None,
        }
    }
}

/// Type alias for Results using TransportError
pub type Result<T> = std::result::Result<T, TransportError>;
