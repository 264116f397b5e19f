//! Shared analyzer state
//!
//! One instance is shared between the dispatcher, the monitor loop, the
//! edge pump, and the watchdog. Everything on the hot path reads atomics;
//! the only lock is around the capture configuration, which changes rarely
//! and must never be observed half-replaced.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, Ordering};

use common::MonotonicClock;
use protocol::{CaptureState, MonitorConfig};

#[derive(Debug)]
pub struct AnalyzerState {
    config: Mutex<MonitorConfig>,
    /// Capture pipeline armed. Checked by the edge pump on every edge.
    pub monitoring: AtomicBool,
    /// A bus reset was observed and not yet reported.
    pub bus_reset: AtomicBool,
    /// The monitor loop should discard buffered capture data.
    pub reset_rings: AtomicBool,
    /// Unrecoverable error; processing stops and the watchdog goes quiet.
    pub fatal: AtomicBool,
    pub device_count: AtomicU8,
    /// Bytes pending in the capture ring, as last seen by the monitor loop.
    pub buffer_usage: AtomicU16,
    pub clock: MonotonicClock,
}

impl AnalyzerState {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config: Mutex::new(config),
            monitoring: AtomicBool::new(false),
            bus_reset: AtomicBool::new(false),
            reset_rings: AtomicBool::new(false),
            fatal: AtomicBool::new(false),
            device_count: AtomicU8::new(0),
            buffer_usage: AtomicU16::new(0),
            clock: MonotonicClock::new(),
        }
    }

    /// Copy the current capture configuration out of the lock.
    pub fn config(&self) -> MonitorConfig {
        *self.config.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the capture configuration. All fields change together; the
    /// critical section is a single copy.
    pub fn set_config(&self, config: MonitorConfig) {
        *self.config.lock().unwrap_or_else(|e| e.into_inner()) = config;
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::Relaxed)
    }

    pub fn capture_state(&self) -> CaptureState {
        if self.is_monitoring() {
            CaptureState::Capturing
        } else {
            CaptureState::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_replacement_is_whole() {
        let state = AnalyzerState::new(MonitorConfig::default());
        let replacement = MonitorConfig {
            addr_filter: 5,
            filter_in: true,
            ..Default::default()
        };
        state.set_config(replacement);
        assert_eq!(state.config(), replacement);
    }

    #[test]
    fn test_capture_state_tracks_monitoring_flag() {
        let state = AnalyzerState::new(MonitorConfig::default());
        assert_eq!(state.capture_state(), CaptureState::Idle);
        state.monitoring.store(true, Ordering::Relaxed);
        assert_eq!(state.capture_state(), CaptureState::Capturing);
    }
}
