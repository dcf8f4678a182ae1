//! Logging setup
//!
//! Internal runtime events go through `tracing` under the `drake_runtime`
//! target. User-facing diagnostics do not; they are written to the
//! platform's error stream (see `Runtime::diagnostic`).

use crate::config::{DEFAULT_LOG_FILTER, RuntimeConfig};
use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber filtered by `config.log_filter`
///
/// Returns false when a global subscriber was already installed. An invalid
/// filter falls back to the default.
pub fn init_logging(config: &RuntimeConfig) -> bool {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|e| {
        eprintln!(
            "Warning: DRAKE_LOG='{}' is not a valid filter ({}), using '{}'",
            config.log_filter, e, DEFAULT_LOG_FILTER
        );
        EnvFilter::new(DEFAULT_LOG_FILTER)
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}
