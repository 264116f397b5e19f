//! Transaction correlation
//!
//! USB is half duplex: at most one token/data/handshake exchange is in
//! flight at a time. The tracker remembers the most recent token and
//! attributes the address and endpoint it carried to the data and handshake
//! packets that follow, which carry neither. It never drops packets; the
//! filter decides what reaches the host.

use tracing::trace;

use crate::packet::{SetupRequest, UsbPacket};
use crate::pid::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    ControlSetup,
    ControlData,
    BulkIn,
    BulkOut,
}

/// One correlated token/data/handshake exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub addr: u8,
    pub endpoint: u8,
    /// Timestamp of the opening token
    pub start_time: u32,
}

/// Results the tracker surfaces to the monitor loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerEvent {
    /// A control SETUP data stage was decoded
    Setup(SetupRequest),
    /// A handshake closed the active transaction
    Completed(Transaction),
}

#[derive(Debug, Default)]
pub struct TransactionTracker {
    active: Option<Transaction>,
}

impl TransactionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next decoded packet in bus order.
    ///
    /// Data and handshake packets get `dev_addr`/`endpoint` filled in from
    /// the active transaction's token. SOF tokens are frame keep-alives and
    /// do not open a transaction.
    pub fn on_packet(&mut self, packet: &mut UsbPacket<'_>) -> Option<TrackerEvent> {
        match packet.pid {
            Pid::Sof => None,
            Pid::Setup | Pid::In | Pid::Out => {
                let kind = match packet.pid {
                    Pid::Setup => TransactionKind::ControlSetup,
                    Pid::In if packet.endpoint == 0 => TransactionKind::ControlData,
                    Pid::In => TransactionKind::BulkIn,
                    Pid::Out if packet.endpoint == 0 => TransactionKind::ControlData,
                    _ => TransactionKind::BulkOut,
                };
                trace!(?kind, addr = packet.dev_addr, ep = packet.endpoint, "token");
                self.active = Some(Transaction {
                    kind,
                    addr: packet.dev_addr,
                    endpoint: packet.endpoint,
                    start_time: packet.timestamp,
                });
                None
            }
            Pid::Data0 | Pid::Data1 => {
                let transaction = self.active.as_ref()?;
                packet.dev_addr = transaction.addr;
                packet.endpoint = transaction.endpoint;
                if transaction.kind == TransactionKind::ControlSetup && packet.data.len() == 8 {
                    return SetupRequest::parse(packet.data).map(TrackerEvent::Setup);
                }
                None
            }
            Pid::Ack | Pid::Nak | Pid::Stall => {
                let transaction = self.active.take()?;
                packet.dev_addr = transaction.addr;
                packet.endpoint = transaction.endpoint;
                Some(TrackerEvent::Completed(transaction))
            }
        }
    }

    /// A bus reset aborts whatever was in flight.
    pub fn on_bus_reset(&mut self) {
        self.active = None;
    }

    pub fn in_progress(&self) -> bool {
        self.active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(pid: Pid, addr: u8, endpoint: u8, timestamp: u32) -> UsbPacket<'static> {
        UsbPacket {
            timestamp,
            pid,
            dev_addr: addr,
            endpoint,
            crc_valid: true,
            data: &[],
        }
    }

    fn data_packet(pid: Pid, data: &[u8]) -> UsbPacket<'_> {
        UsbPacket {
            timestamp: 0,
            pid,
            dev_addr: 0,
            endpoint: 0,
            crc_valid: true,
            data,
        }
    }

    #[test]
    fn test_control_setup_exchange() {
        let mut tracker = TransactionTracker::new();

        let mut setup = token(Pid::Setup, 5, 2, 1000);
        assert_eq!(tracker.on_packet(&mut setup), None);
        assert!(tracker.in_progress());

        let payload = [0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x40, 0x00];
        let mut data = data_packet(Pid::Data0, &payload);
        let event = tracker.on_packet(&mut data);
        assert_eq!(data.dev_addr, 5);
        assert_eq!(data.endpoint, 2);
        let Some(TrackerEvent::Setup(request)) = event else {
            panic!("expected a decoded setup request, got {event:?}");
        };
        assert_eq!(request.b_request, 0x06);
        assert_eq!(request.w_length, 64);

        let mut ack = data_packet(Pid::Ack, &[]);
        let event = tracker.on_packet(&mut ack);
        assert_eq!(ack.dev_addr, 5);
        assert_eq!(ack.endpoint, 2);
        let Some(TrackerEvent::Completed(transaction)) = event else {
            panic!("expected a completed transaction, got {event:?}");
        };
        assert_eq!(transaction.kind, TransactionKind::ControlSetup);
        assert_eq!(transaction.addr, 5);
        assert_eq!(transaction.endpoint, 2);
        assert_eq!(transaction.start_time, 1000);
        assert!(!tracker.in_progress());
    }

    #[test]
    fn test_classification_by_endpoint() {
        let mut tracker = TransactionTracker::new();

        tracker.on_packet(&mut token(Pid::In, 3, 0, 0));
        let mut ack = data_packet(Pid::Ack, &[]);
        let Some(TrackerEvent::Completed(t)) = tracker.on_packet(&mut ack) else {
            panic!("expected completion");
        };
        assert_eq!(t.kind, TransactionKind::ControlData);

        tracker.on_packet(&mut token(Pid::In, 3, 1, 0));
        let Some(TrackerEvent::Completed(t)) = tracker.on_packet(&mut ack) else {
            panic!("expected completion");
        };
        assert_eq!(t.kind, TransactionKind::BulkIn);

        tracker.on_packet(&mut token(Pid::Out, 3, 2, 0));
        let Some(TrackerEvent::Completed(t)) = tracker.on_packet(&mut ack) else {
            panic!("expected completion");
        };
        assert_eq!(t.kind, TransactionKind::BulkOut);
    }

    #[test]
    fn test_sof_does_not_open_a_transaction() {
        let mut tracker = TransactionTracker::new();
        assert_eq!(tracker.on_packet(&mut token(Pid::Sof, 0, 0, 0)), None);
        assert!(!tracker.in_progress());
    }

    #[test]
    fn test_orphan_data_and_handshake_are_ignored() {
        let mut tracker = TransactionTracker::new();
        let mut data = data_packet(Pid::Data0, &[1, 2, 3]);
        assert_eq!(tracker.on_packet(&mut data), None);
        assert_eq!(data.dev_addr, 0);
        let mut ack = data_packet(Pid::Ack, &[]);
        assert_eq!(tracker.on_packet(&mut ack), None);
    }

    #[test]
    fn test_non_setup_data_is_not_parsed_as_setup() {
        let mut tracker = TransactionTracker::new();
        tracker.on_packet(&mut token(Pid::Out, 4, 1, 0));
        // 8 bytes on a bulk transaction must not decode as a setup record.
        let payload = [0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x40, 0x00];
        let mut data = data_packet(Pid::Data0, &payload);
        assert_eq!(tracker.on_packet(&mut data), None);
        assert_eq!(data.dev_addr, 4);
    }

    #[test]
    fn test_bus_reset_aborts_active_transaction() {
        let mut tracker = TransactionTracker::new();
        tracker.on_packet(&mut token(Pid::Setup, 5, 2, 0));
        assert!(tracker.in_progress());
        tracker.on_bus_reset();
        assert!(!tracker.in_progress());
        // The next handshake has nothing to complete.
        let mut ack = data_packet(Pid::Ack, &[]);
        assert_eq!(tracker.on_packet(&mut ack), None);
    }

    #[test]
    fn test_token_replaces_previous_token() {
        let mut tracker = TransactionTracker::new();
        tracker.on_packet(&mut token(Pid::Setup, 5, 2, 0));
        tracker.on_packet(&mut token(Pid::In, 6, 1, 0));
        let mut ack = data_packet(Pid::Ack, &[]);
        let Some(TrackerEvent::Completed(t)) = tracker.on_packet(&mut ack) else {
            panic!("expected completion");
        };
        assert_eq!(t.addr, 6);
        assert_eq!(t.kind, TransactionKind::BulkIn);
    }
}
