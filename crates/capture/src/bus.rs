//! Bus attach/detach monitoring
//!
//! Periodically sampled line state drives a small connection state machine.
//! A full-speed device pulls D+ high through its termination resistor, a
//! low-speed device pulls D- high. Loss of bus power detaches everything.
//!
//! Bus reset is not reported from here: SE0 timing is owned by the signal
//! decoder, which sees the line with much finer granularity. Sampling SE0
//! while attached only steps the state back to Powered; when the device's
//! termination reappears it is announced again, without inflating the
//! device count.

use protocol::UsbSpeed;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BusState {
    Detached,
    Attached,
    Powered,
    Configured,
}

/// Connection changes worth telling the host about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    Connected(UsbSpeed),
    Disconnected,
}

#[derive(Debug)]
pub struct BusMonitor {
    state: BusState,
    device_count: u8,
}

impl BusMonitor {
    pub fn new() -> Self {
        Self {
            state: BusState::Detached,
            device_count: 0,
        }
    }

    /// Feed one sample of bus power and line levels.
    pub fn sample(&mut self, bus_powered: bool, dp: bool, dm: bool) -> Option<BusEvent> {
        if !bus_powered {
            let had_devices = self.device_count > 0;
            self.state = BusState::Detached;
            self.device_count = 0;
            return had_devices.then(|| {
                info!("bus power lost");
                BusEvent::Disconnected
            });
        }

        if dp != dm {
            // Exactly one line pulled high: a device termination.
            if matches!(self.state, BusState::Detached | BusState::Powered) {
                let speed = if dp { UsbSpeed::Full } else { UsbSpeed::Low };
                // A device coming back after a reset is still the same
                // device; only a fresh attach bumps the count.
                if self.state == BusState::Detached {
                    self.device_count = self.device_count.saturating_add(1);
                }
                self.state = BusState::Attached;
                info!(?speed, "device attached");
                return Some(BusEvent::Connected(speed));
            }
        } else if !dp && !dm && self.state >= BusState::Attached {
            self.state = BusState::Powered;
        }
        None
    }

    pub fn state(&self) -> BusState {
        self.state
    }

    pub fn device_count(&self) -> u8 {
        self.device_count
    }
}

impl Default for BusMonitor {
    fn default() -> Self {
        Self::new()
    }
}
