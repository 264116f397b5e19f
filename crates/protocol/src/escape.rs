//! Byte stuffing for the host link
//!
//! Two byte values are reserved on the wire: `SYNC_BYTE` (0xAA) marks the
//! start of a frame and `ESCAPE_BYTE` (0x55) introduces an escape sequence.
//! A literal occurrence of either inside a frame is replaced by
//! `ESCAPE_BYTE` followed by the byte XOR 0xFF. The leading SYNC byte of a
//! frame is the only unescaped 0xAA on the wire, which is what makes frame
//! boundaries unambiguous.

use crate::error::{ProtocolError, Result};
use crate::types::{ESCAPE_BYTE, SYNC_BYTE};

/// True if `byte` must be escaped before transmission.
#[inline]
pub fn needs_escape(byte: u8) -> bool {
    byte == SYNC_BYTE || byte == ESCAPE_BYTE
}

/// Append `byte` to `out`, escaping it if it is a reserved value.
#[inline]
pub fn escape_into(byte: u8, out: &mut Vec<u8>) {
    if needs_escape(byte) {
        out.push(ESCAPE_BYTE);
        out.push(byte ^ 0xFF);
    } else {
        out.push(byte);
    }
}

/// Escape a byte sequence for transmission.
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &byte in data {
        escape_into(byte, &mut out);
    }
    out
}

/// Reverse byte stuffing.
///
/// Fails with [`ProtocolError::DanglingEscape`] if the input ends in the
/// middle of an escape sequence.
pub fn unescape(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut escape_next = false;
    for &byte in data {
        if escape_next {
            out.push(byte ^ 0xFF);
            escape_next = false;
        } else if byte == ESCAPE_BYTE {
            escape_next = true;
        } else {
            out.push(byte);
        }
    }
    if escape_next {
        return Err(ProtocolError::DanglingEscape);
    }
    Ok(out)
}
