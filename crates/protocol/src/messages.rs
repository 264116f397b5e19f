//! Typed frame payloads
//!
//! Builders and parsers for the report payloads the analyzer emits and the
//! command payloads the host sends. Each type maps to exactly one
//! [`PacketType`](crate::types::PacketType) and a fixed byte layout;
//! multi-byte integers are big-endian on the wire.

use crate::error::{ProtocolError, Result};
use crate::frame::FramePacket;
use crate::types::{ErrorCode, MonitorConfig, PacketType, UsbSpeed};

/// A captured USB packet as reported to the host (`USB_PACKET`, 0x80)
///
/// Layout: `[timestamp:u32 BE][pid][dev_addr][endpoint][flags][data...]`
/// where flags bit 7 is the CRC-valid bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbPacketReport {
    /// Capture timestamp, microseconds
    pub timestamp: u32,
    /// Raw USB packet identifier byte
    pub pid: u8,
    /// Device address attributed to the packet (0-127)
    pub dev_addr: u8,
    /// Endpoint attributed to the packet (0-15)
    pub endpoint: u8,
    /// Whether the packet's USB CRC checked out
    pub crc_valid: bool,
    /// Packet payload bytes
    pub data: Vec<u8>,
}

/// Fixed part of the USB_PACKET payload before the data bytes.
pub const USB_PACKET_HEADER_LEN: usize = 8;

impl UsbPacketReport {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(USB_PACKET_HEADER_LEN + self.data.len());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.push(self.pid);
        out.push(self.dev_addr);
        out.push(self.endpoint);
        out.push(if self.crc_valid { 0x80 } else { 0x00 });
        out.extend_from_slice(&self.data);
        out
    }

    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < USB_PACKET_HEADER_LEN {
            return Err(ProtocolError::TruncatedPayload {
                expected: USB_PACKET_HEADER_LEN,
                actual: payload.len(),
            });
        }
        Ok(Self {
            timestamp: u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]),
            pid: payload[4],
            dev_addr: payload[5],
            endpoint: payload[6],
            crc_valid: payload[7] & 0x80 != 0,
            data: payload[USB_PACKET_HEADER_LEN..].to_vec(),
        })
    }
}

/// Bus state change notification (`USB_STATE_CHANGE`, 0x81)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// Bus power lost or device unplugged; payload `[0]`
    Disconnected,
    /// A device attached at the given speed; payload `[1, speed]`
    Connected(UsbSpeed),
    /// Bus reset observed; payload `[2]`
    BusReset,
}

impl StateChange {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Disconnected => vec![0],
            Self::Connected(speed) => vec![1, *speed as u8],
            Self::BusReset => vec![2],
        }
    }

    pub fn parse(payload: &[u8]) -> Result<Self> {
        match payload {
            [0, ..] => Ok(Self::Disconnected),
            [1, speed, ..] => UsbSpeed::from_u8(*speed)
                .map(Self::Connected)
                .ok_or(ProtocolError::InvalidField {
                    field: "speed",
                    value: *speed,
                }),
            [2, ..] => Ok(Self::BusReset),
            [code, ..] => Err(ProtocolError::InvalidField {
                field: "state change code",
                value: *code,
            }),
            [] => Err(ProtocolError::TruncatedPayload {
                expected: 1,
                actual: 0,
            }),
        }
    }
}

/// Periodic analyzer status (`STATUS_REPORT`, 0x82)
///
/// Layout: `[device_count][capture_state][buffer_usage:u16 BE]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    /// Connected USB device count
    pub device_count: u8,
    /// 0 = idle, 1 = capturing
    pub capture_state: u8,
    /// Bytes pending in the capture ring buffer
    pub buffer_usage: u16,
}

impl StatusReport {
    pub fn encode(&self) -> Vec<u8> {
        let usage = self.buffer_usage.to_be_bytes();
        vec![self.device_count, self.capture_state, usage[0], usage[1]]
    }

    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < 4 {
            return Err(ProtocolError::TruncatedPayload {
                expected: 4,
                actual: payload.len(),
            });
        }
        Ok(Self {
            device_count: payload[0],
            capture_state: payload[1],
            buffer_usage: u16::from_be_bytes([payload[2], payload[3]]),
        })
    }
}

/// Analyzer-side error report (`ERROR_REPORT`, 0x83)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorReport {
    pub code: ErrorCode,
    /// Free-form context byte (e.g. the state the error was raised in)
    pub context: u8,
}

impl ErrorReport {
    pub fn encode(&self) -> Vec<u8> {
        vec![self.code as u8, self.context]
    }

    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < 2 {
            return Err(ProtocolError::TruncatedPayload {
                expected: 2,
                actual: payload.len(),
            });
        }
        let code = ErrorCode::from_u8(payload[0]).ok_or(ProtocolError::InvalidField {
            field: "error code",
            value: payload[0],
        })?;
        Ok(Self {
            code,
            context: payload[1],
        })
    }
}

/// Positive acknowledgment (`ACK`, 0xF0); payload is the acknowledged
/// command's sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub sequence: u8,
}

impl Ack {
    pub fn encode(&self) -> Vec<u8> {
        vec![self.sequence]
    }

    pub fn parse(payload: &[u8]) -> Result<Self> {
        match payload {
            [sequence, ..] => Ok(Self { sequence: *sequence }),
            [] => Err(ProtocolError::TruncatedPayload {
                expected: 1,
                actual: 0,
            }),
        }
    }
}

/// Negative acknowledgment (`NACK`, 0xF1); payload is
/// `[sequence][error_code]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nack {
    pub sequence: u8,
    pub code: ErrorCode,
}

impl Nack {
    pub fn encode(&self) -> Vec<u8> {
        vec![self.sequence, self.code as u8]
    }

    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < 2 {
            return Err(ProtocolError::TruncatedPayload {
                expected: 2,
                actual: payload.len(),
            });
        }
        let code = ErrorCode::from_u8(payload[1]).ok_or(ProtocolError::InvalidField {
            field: "error code",
            value: payload[1],
        })?;
        Ok(Self {
            sequence: payload[0],
            code,
        })
    }
}

/// A validated host command
///
/// Produced by [`Command::parse`] from an inbound frame. Unknown type bytes
/// fail with [`ProtocolError::UnknownPacketType`], which the dispatcher maps
/// to NACK(INVALID_COMMAND).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Reset capture state, ring buffers, and the timestamp clock
    Reset,
    /// Begin capturing; `None` selects the default configuration
    StartCapture(Option<MonitorConfig>),
    /// Stop capturing
    StopCapture,
    /// Replace the capture filter configuration
    SetFilter(MonitorConfig),
    /// Request an immediate STATUS_REPORT
    GetStatus,
    /// Set the microsecond timestamp clock
    SetTimestamp(u32),
    /// Device configuration record (reserved; accepted and acknowledged)
    SetConfig(Vec<u8>),
}

impl Command {
    /// Parse a command from a received frame.
    pub fn parse(packet: &FramePacket) -> Result<Self> {
        let packet_type = packet
            .packet_type()
            .filter(|t| t.is_command())
            .ok_or(ProtocolError::UnknownPacketType(packet.type_byte))?;
        let payload = &packet.payload;
        match packet_type {
            PacketType::CmdReset => Ok(Self::Reset),
            PacketType::CmdStartCapture => {
                if payload.len() >= crate::types::MONITOR_CONFIG_WIRE_LEN {
                    Ok(Self::StartCapture(Some(MonitorConfig::from_wire(payload))))
                } else {
                    Ok(Self::StartCapture(None))
                }
            }
            PacketType::CmdStopCapture => Ok(Self::StopCapture),
            PacketType::CmdSetFilter => Ok(Self::SetFilter(MonitorConfig::from_wire(payload))),
            PacketType::CmdGetStatus => Ok(Self::GetStatus),
            PacketType::CmdSetTimestamp => {
                if payload.len() < 4 {
                    return Err(ProtocolError::TruncatedPayload {
                        expected: 4,
                        actual: payload.len(),
                    });
                }
                Ok(Self::SetTimestamp(u32::from_be_bytes([
                    payload[0], payload[1], payload[2], payload[3],
                ])))
            }
            PacketType::CmdSetConfig => Ok(Self::SetConfig(payload.clone())),
            _ => Err(ProtocolError::UnknownPacketType(packet.type_byte)),
        }
    }
}
