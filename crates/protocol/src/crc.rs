//! CRC-16/CCITT for link frame integrity
//!
//! Polynomial 0x1021, initial value 0xFFFF, MSB-first, table-driven. The
//! checksum covers the unescaped `[TYPE, LEN, SEQ, DATA...]` bytes of a
//! frame and is transmitted big-endian.
//!
//! The incremental form (`crc16_continue`) lets the encoder checksum the
//! three header bytes and the payload without assembling them in one buffer.

/// CCITT polynomial, MSB-first form.
const POLY: u16 = 0x1021;

const TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Compute the CRC-16/CCITT of `data` from the initial value 0xFFFF.
#[inline]
pub fn crc16(data: &[u8]) -> u16 {
    crc16_continue(data, 0xFFFF)
}

/// Continue a CRC-16/CCITT computation from a previous running value.
///
/// `crc16_continue(b, crc16(a))` equals `crc16` of `a` followed by `b`.
#[inline]
pub fn crc16_continue(data: &[u8], mut crc: u16) -> u16 {
    for &byte in data {
        crc = (crc << 8) ^ TABLE[(((crc >> 8) as u8) ^ byte) as usize];
    }
    crc
}
