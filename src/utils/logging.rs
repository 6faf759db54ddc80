//! Structured logging setup via tracing-subscriber
//!
//! `PEERLINK_LOG` overrides the configured level with a full `EnvFilter`
//! directive (e.g. `peerlink=debug`).

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Environment variable consulted before the configured level
pub const LOG_ENV_VAR: &str = "PEERLINK_LOG";

/// Build the filter: environment first, configured level as fallback
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(config.log_level.as_str().to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a global fmt subscriber.
///
/// Returns false if a global subscriber was already installed, which is the
/// normal case when a host application sets up its own.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = build_filter(config);

    let installed = if config.json_format {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init()
            .is_ok()
    } else {
        fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
    };

    if installed {
        tracing::info!(app = %config.app_name, "Logging initialized");
    }
    installed
}
