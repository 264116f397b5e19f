//! Real-time USB capture pipeline for usbshark
//!
//! Everything on the hot path between the line edges and the host link:
//! the lock-free SPSC ring buffer, the edge-to-bytes signal decoder, the
//! USB packet decoder with CRC checking, transaction correlation, capture
//! filtering, and bus attach/detach monitoring.
//!
//! Data flow:
//!
//! ```text
//! edge pump -> SignalDecoder -> ring -> UsbPacket::decode
//!           -> TransactionTracker -> filter::admit -> host link
//! ```

pub mod bus;
pub mod crc;
pub mod filter;
pub mod packet;
pub mod pid;
pub mod ring;
pub mod signal;
pub mod transaction;

pub use bus::{BusEvent, BusMonitor, BusState};
pub use crc::{usb_crc5, usb_crc16};
pub use filter::admit;
pub use packet::{SetupRequest, UsbPacket};
pub use pid::Pid;
pub use ring::{Consumer, Producer, ring_buffer};
pub use signal::{
    EOP_TICKS, MAX_PACKET_BYTES, RESET_TICKS, SignalDecoder, SignalEvent,
};
pub use transaction::{Transaction, TrackerEvent, TransactionKind, TransactionTracker};
