//! # Utility Modules
//!
//! Supporting utilities for logging and observability.
//!
//! ## Components
//! - **Logging**: tracing-subscriber setup driven by [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: thread-safe counters for connection churn and packet traffic

pub mod logging;
pub mod metrics;

pub use metrics::{global_metrics, Metrics, MetricsSnapshot};
