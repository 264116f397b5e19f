//! Systemd service integration
//!
//! sd-notify lifecycle messages and the watchdog keepalive task. The
//! watchdog doubles as the analyzer's fatal-error recovery path: once the
//! fatal flag is set the keepalives stop, and systemd restarts the service
//! after the configured timeout.

use anyhow::{Context, Result};
use std::env;
use std::os::unix::net::UnixDatagram;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{debug, error, info, warn};

use crate::state::AnalyzerState;

fn notify(message: &str) -> Result<()> {
    if let Ok(socket_path) = env::var("NOTIFY_SOCKET") {
        let socket = UnixDatagram::unbound().context("Failed to create Unix socket")?;
        socket
            .send_to(message.as_bytes(), &socket_path)
            .with_context(|| format!("Failed to send '{}' to systemd", message))?;
        debug!(message, "notified systemd");
    }
    Ok(())
}

/// Notify systemd that the service is ready
pub fn notify_ready() -> Result<()> {
    notify("READY=1")
}

/// Notify systemd that the service is stopping
pub fn notify_stopping() -> Result<()> {
    notify("STOPPING=1")
}

/// Send a watchdog keepalive to systemd
pub fn notify_watchdog() -> Result<()> {
    notify("WATCHDOG=1")
}

/// Send a custom status message to systemd
pub fn notify_status(status: &str) -> Result<()> {
    notify(&format!("STATUS={}", status))
}

/// Get the watchdog timeout configured by systemd (in microseconds)
pub fn get_watchdog_timeout() -> Option<u64> {
    env::var("WATCHDOG_USEC").ok().and_then(|s| s.parse().ok())
}

/// Check if running under systemd
pub fn is_systemd() -> bool {
    env::var("NOTIFY_SOCKET").is_ok()
}

/// Watchdog task sending periodic keepalives at half the configured
/// interval
///
/// Keepalives stop permanently once `state.fatal` is set, so a wedged or
/// failed analyzer is restarted by systemd rather than limping along.
/// Returns a no-op task when the watchdog is not enabled.
pub fn spawn_watchdog_task(state: Arc<AnalyzerState>) -> tokio::task::JoinHandle<()> {
    let Some(timeout_usec) = get_watchdog_timeout() else {
        debug!("systemd watchdog not enabled, skipping watchdog task");
        return tokio::spawn(async {});
    };

    let interval_secs = (timeout_usec / 1_000_000) / 2;
    let interval = std::time::Duration::from_secs(interval_secs.max(1));

    info!(
        "Systemd watchdog enabled, interval: {}s (timeout: {}s)",
        interval.as_secs(),
        timeout_usec / 1_000_000
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if state.fatal.load(Ordering::Relaxed) {
                warn!("fatal error flagged, watchdog keepalives stopped");
                let _ = notify_status("Fatal error, awaiting restart");
                return;
            }
            if let Err(e) = notify_watchdog() {
                error!("Failed to send watchdog keepalive: {:#}", e);
            }
        }
    })
}
