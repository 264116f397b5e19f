//! Wire-level constants and shared domain types
//!
//! Packet type codes, error codes, and the capture configuration record as
//! they appear on the host link. Both the analyzer and any host tooling must
//! agree on these byte values.

use serde::{Deserialize, Serialize};

/// Start-of-frame marker. Never escaped; every other occurrence of this
/// value in a frame is byte-stuffed.
pub const SYNC_BYTE: u8 = 0xAA;

/// Escape marker. `0x55` followed by `byte ^ 0xFF` encodes a literal
/// `SYNC_BYTE` or `ESCAPE_BYTE`.
pub const ESCAPE_BYTE: u8 = 0x55;

/// Maximum payload length of a single frame. The length field is one byte,
/// so larger payloads are not representable and must be rejected.
pub const MAX_PAYLOAD: usize = 255;

/// Frame type codes
///
/// Commands flow host to analyzer, reports flow analyzer to host, and
/// ACK/NACK acknowledge received command frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    // Commands (host -> analyzer)
    CmdReset = 0x01,
    CmdStartCapture = 0x02,
    CmdStopCapture = 0x03,
    CmdSetFilter = 0x04,
    CmdGetStatus = 0x05,
    CmdSetTimestamp = 0x06,
    CmdSetConfig = 0x07,

    // Reports (analyzer -> host)
    UsbPacket = 0x80,
    UsbStateChange = 0x81,
    StatusReport = 0x82,
    ErrorReport = 0x83,

    // Acknowledgments
    Ack = 0xF0,
    Nack = 0xF1,
}

impl PacketType {
    /// Map a raw type byte to a known packet type.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::CmdReset),
            0x02 => Some(Self::CmdStartCapture),
            0x03 => Some(Self::CmdStopCapture),
            0x04 => Some(Self::CmdSetFilter),
            0x05 => Some(Self::CmdGetStatus),
            0x06 => Some(Self::CmdSetTimestamp),
            0x07 => Some(Self::CmdSetConfig),
            0x80 => Some(Self::UsbPacket),
            0x81 => Some(Self::UsbStateChange),
            0x82 => Some(Self::StatusReport),
            0x83 => Some(Self::ErrorReport),
            0xF0 => Some(Self::Ack),
            0xF1 => Some(Self::Nack),
            _ => None,
        }
    }

    /// True for command frames (host -> analyzer).
    pub fn is_command(self) -> bool {
        (self as u8) < 0x80
    }
}

/// Error codes carried in NACK and ERROR_REPORT payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    None = 0x00,
    InvalidCommand = 0x01,
    BufferOverflow = 0x02,
    CrcFailure = 0x03,
    InvalidState = 0x04,
    UsbError = 0x05,
    Timeout = 0x06,
    Internal = 0xFF,
}

impl ErrorCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::None),
            0x01 => Some(Self::InvalidCommand),
            0x02 => Some(Self::BufferOverflow),
            0x03 => Some(Self::CrcFailure),
            0x04 => Some(Self::InvalidState),
            0x05 => Some(Self::UsbError),
            0x06 => Some(Self::Timeout),
            0xFF => Some(Self::Internal),
            _ => None,
        }
    }
}

/// Capture state byte reported in STATUS_REPORT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CaptureState {
    #[default]
    Idle = 0,
    Capturing = 1,
}

/// Bus speed of the monitored USB segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum UsbSpeed {
    /// Low speed - 1.5 Mbps
    Low = 0,
    /// Full speed - 12 Mbps
    #[default]
    Full = 1,
    /// High speed - 480 Mbps (not decodable by this analyzer, reported only)
    High = 2,
}

impl UsbSpeed {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Low),
            1 => Some(Self::Full),
            2 => Some(Self::High),
            _ => None,
        }
    }
}

/// Capture configuration
///
/// Selects which packets the analyzer forwards to the host. Carried as the
/// payload of START_CAPTURE and SET_FILTER commands; a payload shorter than
/// the wire record selects the built-in default. All fields are replaced
/// together when the configuration changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Expected bus speed
    #[serde(default)]
    pub speed: UsbSpeed,
    /// Forward control transfers (endpoint 0)
    pub capture_control: bool,
    /// Forward bulk transfers (the residual class for non-zero endpoints)
    pub capture_bulk: bool,
    /// Forward interrupt transfers
    pub capture_interrupt: bool,
    /// Forward isochronous transfers
    pub capture_isoc: bool,
    /// Only forward packets for this device address (0 = disabled)
    pub addr_filter: u8,
    /// Only forward packets for this endpoint (0 = disabled)
    pub ep_filter: u8,
    /// Drop IN-direction packets
    pub filter_in: bool,
    /// Drop OUT/SETUP-direction packets
    pub filter_out: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            speed: UsbSpeed::Full,
            capture_control: true,
            capture_bulk: true,
            capture_interrupt: true,
            capture_isoc: true,
            addr_filter: 0,
            ep_filter: 0,
            filter_in: false,
            filter_out: false,
        }
    }
}

/// Size of the serialized configuration record.
pub const MONITOR_CONFIG_WIRE_LEN: usize = 9;

impl MonitorConfig {
    /// Serialize to the 9-byte wire record.
    pub fn to_wire(&self) -> [u8; MONITOR_CONFIG_WIRE_LEN] {
        [
            self.speed as u8,
            self.capture_control as u8,
            self.capture_bulk as u8,
            self.capture_interrupt as u8,
            self.capture_isoc as u8,
            self.addr_filter,
            self.ep_filter,
            self.filter_in as u8,
            self.filter_out as u8,
        ]
    }

    /// Parse a wire record.
    ///
    /// A payload shorter than the record selects the default configuration,
    /// matching the command semantics for START_CAPTURE and SET_FILTER.
    pub fn from_wire(payload: &[u8]) -> Self {
        if payload.len() < MONITOR_CONFIG_WIRE_LEN {
            return Self::default();
        }
        Self {
            speed: UsbSpeed::from_u8(payload[0]).unwrap_or_default(),
            capture_control: payload[1] != 0,
            capture_bulk: payload[2] != 0,
            capture_interrupt: payload[3] != 0,
            capture_isoc: payload[4] != 0,
            addr_filter: payload[5] & 0x7F,
            ep_filter: payload[6] & 0x0F,
            filter_in: payload[7] != 0,
            filter_out: payload[8] != 0,
        }
    }
}
