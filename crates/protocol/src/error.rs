//! Protocol error types

use thiserror::Error;

/// Errors raised while encoding or parsing link frames
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload exceeds the one-byte length field
    #[error("Payload too large: {len} bytes (max: {max})")]
    PayloadTooLarge { len: usize, max: usize },

    /// Payload ended before the expected record was complete
    #[error("Truncated payload: expected {expected} bytes, got {actual}")]
    TruncatedPayload { expected: usize, actual: usize },

    /// Escape marker at the end of a byte sequence with nothing following it
    #[error("Dangling escape byte at end of input")]
    DanglingEscape,

    /// Frame type byte does not map to a known packet type
    #[error("Unknown packet type: {0:#04x}")]
    UnknownPacketType(u8),

    /// Report payload carried an out-of-range discriminant
    #[error("Invalid field value {value:#04x} for {field}")]
    InvalidField { field: &'static str, value: u8 },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
