//! Logging setup and configuration

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Setup the tracing subscriber for the analyzer
///
/// Honors `RUST_LOG` when set, otherwise falls back to `default_level`.
/// Thread names are included because the capture pipeline runs on several
/// dedicated threads (edge pump, monitor loop, link pumps).
pub fn setup_logging(default_level: &str) -> crate::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| crate::Error::Config(format!("Invalid log filter: {}", e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_thread_names(true))
        .init();

    Ok(())
}
