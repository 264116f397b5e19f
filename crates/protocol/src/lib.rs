//! Host link protocol for the usbshark analyzer
//!
//! This crate defines the framed serial protocol spoken between the analyzer
//! and the host: byte-stuffed frames with CRC-16/CCITT integrity, per-direction
//! sequence numbers, and ACK/NACK acknowledgments. It also holds the domain
//! types that cross the wire (capture configuration, error codes, report
//! payloads).
//!
//! # Frame Format
//!
//! ```text
//! [SYNC 0xAA][TYPE][LEN][SEQ][DATA x LEN][CRC_HI][CRC_LO]
//! ```
//!
//! Every field after the leading SYNC byte is escaped: a literal `0xAA` or
//! `0x55` is replaced by `0x55` followed by the byte XOR `0xFF`. The CRC is
//! computed over the *unescaped* `[TYPE, LEN, SEQ, DATA...]` bytes and
//! appended big-endian.
//!
//! # Example
//!
//! ```
//! use protocol::{FrameEncoder, FrameDecoder, DecodeEvent, PacketType};
//!
//! let mut encoder = FrameEncoder::new();
//! let frame = encoder.encode(PacketType::StatusReport, &[2, 1, 0, 50]).unwrap();
//!
//! let mut decoder = FrameDecoder::new();
//! let mut delivered = None;
//! for byte in frame {
//!     if let Some(DecodeEvent::Packet(packet)) = decoder.on_byte(byte) {
//!         delivered = Some(packet);
//!     }
//! }
//! assert_eq!(delivered.unwrap().payload, vec![2, 1, 0, 50]);
//! ```

pub mod crc;
pub mod error;
pub mod escape;
pub mod frame;
pub mod messages;
pub mod types;

pub use crc::{crc16, crc16_continue};
pub use error::{ProtocolError, Result};
pub use escape::{escape, unescape};
pub use frame::{DecodeEvent, FrameDecoder, FrameEncoder, FramePacket};
pub use messages::{
    Ack, Command, ErrorReport, Nack, StateChange, StatusReport, UsbPacketReport,
};
pub use types::{
    CaptureState, ErrorCode, MonitorConfig, PacketType, UsbSpeed, ESCAPE_BYTE, MAX_PAYLOAD,
    SYNC_BYTE,
};
