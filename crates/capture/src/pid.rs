//! USB packet identifiers
//!
//! The PID byte carries a 4-bit identifier and its complement in the high
//! nibble. Values here are the full 8-bit on-wire bytes.

/// Known USB packet identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Pid {
    // Token
    Out = 0xE1,
    In = 0x69,
    Sof = 0xA5,
    Setup = 0x2D,

    // Data
    Data0 = 0xC3,
    Data1 = 0x4B,

    // Handshake
    Ack = 0xD2,
    Nak = 0x5A,
    Stall = 0x1E,
}

impl Pid {
    /// Map a raw PID byte to a known identifier.
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0xE1 => Some(Self::Out),
            0x69 => Some(Self::In),
            0xA5 => Some(Self::Sof),
            0x2D => Some(Self::Setup),
            0xC3 => Some(Self::Data0),
            0x4B => Some(Self::Data1),
            0xD2 => Some(Self::Ack),
            0x5A => Some(Self::Nak),
            0x1E => Some(Self::Stall),
            _ => None,
        }
    }

    pub fn is_token(self) -> bool {
        matches!(self, Self::Out | Self::In | Self::Sof | Self::Setup)
    }

    pub fn is_data(self) -> bool {
        matches!(self, Self::Data0 | Self::Data1)
    }

    pub fn is_handshake(self) -> bool {
        matches!(self, Self::Ack | Self::Nak | Self::Stall)
    }
}
