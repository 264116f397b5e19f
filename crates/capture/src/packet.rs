//! USB packet decoding
//!
//! Takes the raw bytes of one packet (PID first, as recovered by the signal
//! decoder) and produces a structured view: token packets yield address and
//! endpoint, data packets yield a payload with its CRC verdict, handshake
//! packets carry nothing beyond the PID.

use crate::crc::{usb_crc5, usb_crc16};
use crate::pid::Pid;

/// A decoded USB packet, borrowing its payload from the raw capture bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbPacket<'a> {
    /// Capture timestamp, microseconds
    pub timestamp: u32,
    pub pid: Pid,
    /// Device address. Zero for handshake packets until the transaction
    /// tracker attributes them to the active token.
    pub dev_addr: u8,
    /// Endpoint number, attributed like `dev_addr`
    pub endpoint: u8,
    pub crc_valid: bool,
    /// Data packet payload, empty for tokens and handshakes
    pub data: &'a [u8],
}

impl<'a> UsbPacket<'a> {
    /// Decode one packet from its raw bytes.
    ///
    /// Returns `None` for an unknown PID or a packet too short for its
    /// class. The CRC verdict is recorded rather than enforced, so the host
    /// still sees damaged traffic.
    pub fn decode(raw: &'a [u8], timestamp: u32) -> Option<Self> {
        let (&pid_byte, rest) = raw.split_first()?;
        let pid = Pid::from_raw(pid_byte)?;

        if pid.is_token() {
            if rest.len() < 2 {
                return None;
            }
            let token = (rest[0] as u16 | (rest[1] as u16) << 8) & 0x07FF;
            Some(Self {
                timestamp,
                pid,
                dev_addr: rest[1] & 0x7F,
                endpoint: ((rest[0] & 0x07) << 1) | ((rest[1] & 0x80) >> 7),
                crc_valid: usb_crc5(token) == rest[1] >> 3,
                data: &[],
            })
        } else if pid.is_data() {
            if rest.len() < 2 {
                return None;
            }
            let (payload, trailer) = rest.split_at(rest.len() - 2);
            let crc_valid = if payload.is_empty() {
                true
            } else {
                let wire = (trailer[1] as u16) << 8 | trailer[0] as u16;
                usb_crc16(payload) == wire
            };
            Some(Self {
                timestamp,
                pid,
                dev_addr: 0,
                endpoint: 0,
                crc_valid,
                data: payload,
            })
        } else {
            Some(Self {
                timestamp,
                pid,
                dev_addr: 0,
                endpoint: 0,
                crc_valid: true,
                data: &[],
            })
        }
    }
}

/// A decoded 8-byte SETUP data stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupRequest {
    pub bm_request_type: u8,
    pub b_request: u8,
    pub w_value: u16,
    pub w_index: u16,
    pub w_length: u16,
}

impl SetupRequest {
    /// Parse the data stage of a control SETUP transaction. All multi-byte
    /// fields are little-endian per the USB spec.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 8 {
            return None;
        }
        Some(Self {
            bm_request_type: data[0],
            b_request: data[1],
            w_value: u16::from_le_bytes([data[2], data[3]]),
            w_index: u16::from_le_bytes([data[4], data[5]]),
            w_length: u16::from_le_bytes([data[6], data[7]]),
        })
    }

    /// True for standard requests (GET_DESCRIPTOR, SET_ADDRESS, ...).
    pub fn is_standard_request(&self) -> bool {
        self.bm_request_type & 0x60 == 0x00
    }
}
