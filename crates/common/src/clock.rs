//! Microsecond capture clock
//!
//! Timestamps in USB_PACKET reports are 32-bit microsecond counts that wrap
//! roughly every 71 minutes. The host can rebase the clock at any time with
//! SET_TIMESTAMP, so the clock keeps a host-supplied offset on top of a
//! monotonic instant. All methods are callable from any thread.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct MonotonicClock {
    base: Instant,
    /// Microsecond value the host assigned to `base`.
    offset: AtomicU32,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: AtomicU32::new(0),
        }
    }

    /// Current capture timestamp in microseconds, wrapping at 2^32.
    pub fn now_micros(&self) -> u32 {
        let elapsed = self.base.elapsed().as_micros() as u32;
        elapsed.wrapping_add(self.offset.load(Ordering::Relaxed))
    }

    /// Rebase so that `now_micros` returns `micros` at this moment.
    pub fn set_micros(&self, micros: u32) {
        let elapsed = self.base.elapsed().as_micros() as u32;
        self.offset
            .store(micros.wrapping_sub(elapsed), Ordering::Relaxed);
    }

    /// Rebase to zero, as done on a RESET command.
    pub fn reset(&self) {
        self.set_micros(0);
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clock_advances() {
        let clock = MonotonicClock::new();
        let first = clock.now_micros();
        std::thread::sleep(Duration::from_millis(2));
        let second = clock.now_micros();
        assert!(second.wrapping_sub(first) >= 1_000);
    }

    #[test]
    fn test_set_micros_rebases() {
        let clock = MonotonicClock::new();
        clock.set_micros(1_000_000);
        let now = clock.now_micros();
        assert!(now >= 1_000_000);
        assert!(now < 1_100_000);
    }

    #[test]
    fn test_reset_returns_near_zero() {
        let clock = MonotonicClock::new();
        clock.set_micros(u32::MAX - 10);
        clock.reset();
        assert!(clock.now_micros() < 100_000);
    }

    #[test]
    fn test_rebase_survives_wraparound() {
        let clock = MonotonicClock::new();
        clock.set_micros(u32::MAX - 500);
        std::thread::sleep(Duration::from_millis(2));
        // The counter must have wrapped past zero without panicking.
        let now = clock.now_micros();
        assert!(now < 1_000_000);
    }
}
