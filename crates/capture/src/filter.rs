//! Capture filtering
//!
//! Decides which decoded packets are forwarded to the host. Transfer-class
//! inference is deliberately coarse: endpoint 0 is control, everything else
//! counts as bulk. Interrupt and isochronous classification would need the
//! endpoint descriptors, which this analyzer does not track, so those
//! capture bits never match anything.

use protocol::MonitorConfig;

use crate::packet::UsbPacket;
use crate::pid::Pid;

/// True if the packet passes the configured filters.
pub fn admit(packet: &UsbPacket<'_>, config: &MonitorConfig) -> bool {
    if config.addr_filter != 0 && packet.dev_addr != config.addr_filter {
        return false;
    }
    if config.ep_filter != 0 && packet.endpoint != config.ep_filter {
        return false;
    }

    let is_control = packet.endpoint == 0;
    if is_control {
        if !config.capture_control {
            return false;
        }
    } else if !config.capture_bulk {
        return false;
    }

    if config.filter_in && packet.pid == Pid::In {
        return false;
    }
    if config.filter_out && matches!(packet.pid, Pid::Out | Pid::Setup) {
        return false;
    }
    true
}
