//! Frame encoder and receive state machine
//!
//! The encoder turns `(type, payload)` pairs into escaped wire frames and
//! owns the outgoing sequence counter. The decoder is a byte-at-a-time state
//! machine suitable for running directly in the receive context: feed it one
//! byte per call and it yields a validated packet, or a CRC-mismatch event
//! the caller answers with NACK.

use crate::crc::{crc16, crc16_continue};
use crate::error::{ProtocolError, Result};
use crate::types::{ESCAPE_BYTE, MAX_PAYLOAD, PacketType, SYNC_BYTE};

/// A complete, CRC-validated link frame
///
/// The type byte is kept raw so that unknown command types survive decoding
/// and can be answered with NACK(INVALID_COMMAND) instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePacket {
    /// Raw frame type byte
    pub type_byte: u8,
    /// Sequence number assigned by the sender
    pub sequence: u8,
    /// Unescaped payload
    pub payload: Vec<u8>,
}

impl FramePacket {
    /// The frame type, if it is a known code.
    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::from_u8(self.type_byte)
    }
}

/// Outgoing frame encoder
///
/// Owns the transmit sequence counter: it increments (mod 256) after every
/// successfully encoded frame, independent of the frame type. One encoder
/// instance per link direction.
#[derive(Debug, Default)]
pub struct FrameEncoder {
    sequence: u8,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next encoded frame will carry.
    pub fn next_sequence(&self) -> u8 {
        self.sequence
    }

    /// Encode one frame.
    ///
    /// Returns the complete escaped byte sequence ready for the wire, or
    /// [`ProtocolError::PayloadTooLarge`] if the payload exceeds the one-byte
    /// length field. The sequence counter only advances on success.
    pub fn encode(&mut self, packet_type: PacketType, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() > MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        let header = [packet_type as u8, payload.len() as u8, self.sequence];
        let crc = crc16_continue(payload, crc16(&header));

        // Worst case every byte is escaped, plus sync and CRC.
        let mut frame = Vec::with_capacity(2 * (3 + payload.len() + 2) + 1);
        frame.push(SYNC_BYTE);
        for byte in header {
            crate::escape::escape_into(byte, &mut frame);
        }
        for &byte in payload {
            crate::escape::escape_into(byte, &mut frame);
        }
        crate::escape::escape_into((crc >> 8) as u8, &mut frame);
        crate::escape::escape_into(crc as u8, &mut frame);

        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }
}

/// Outcome of feeding a byte that completed a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// A frame arrived with a valid CRC
    Packet(FramePacket),
    /// A frame arrived but its CRC did not match; the sender should be
    /// answered with NACK(CRC_FAILURE) carrying this sequence number
    CrcMismatch { sequence: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    WaitSync,
    Type,
    Length,
    Sequence,
    Data,
    CrcHigh,
    CrcLow,
}

/// Receive state machine
///
/// `WAIT_SYNC -> TYPE -> LENGTH -> SEQUENCE -> DATA -> CRC_HIGH -> CRC_LOW`,
/// returning to `WAIT_SYNC` after every completed frame. While waiting for
/// sync, only a literal `SYNC_BYTE` advances the machine and escape handling
/// is disabled; in every other state an `ESCAPE_BYTE` arms a one-shot
/// unescape of the following byte.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecodeState,
    escape_next: bool,
    type_byte: u8,
    length: u8,
    sequence: u8,
    payload: Vec<u8>,
    crc_high: u8,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::WaitSync,
            escape_next: false,
            type_byte: 0,
            length: 0,
            sequence: 0,
            payload: Vec::with_capacity(MAX_PAYLOAD),
            crc_high: 0,
        }
    }

    /// Discard any partial frame and return to `WAIT_SYNC`.
    pub fn reset(&mut self) {
        self.state = DecodeState::WaitSync;
        self.escape_next = false;
        self.payload.clear();
    }

    /// Feed one received byte.
    ///
    /// Returns an event when the byte completes a frame, `None` otherwise.
    pub fn on_byte(&mut self, byte: u8) -> Option<DecodeEvent> {
        // Escape handling applies to every field after the sync byte.
        let byte = if self.state == DecodeState::WaitSync {
            byte
        } else if self.escape_next {
            self.escape_next = false;
            byte ^ 0xFF
        } else if byte == ESCAPE_BYTE {
            self.escape_next = true;
            return None;
        } else {
            byte
        };

        match self.state {
            DecodeState::WaitSync => {
                if byte == SYNC_BYTE {
                    self.payload.clear();
                    self.escape_next = false;
                    self.state = DecodeState::Type;
                }
                None
            }
            DecodeState::Type => {
                self.type_byte = byte;
                self.state = DecodeState::Length;
                None
            }
            DecodeState::Length => {
                self.length = byte;
                self.state = DecodeState::Sequence;
                None
            }
            DecodeState::Sequence => {
                self.sequence = byte;
                self.state = if self.length > 0 {
                    DecodeState::Data
                } else {
                    DecodeState::CrcHigh
                };
                None
            }
            DecodeState::Data => {
                if self.payload.len() < MAX_PAYLOAD {
                    self.payload.push(byte);
                }
                if self.payload.len() >= self.length as usize {
                    self.state = DecodeState::CrcHigh;
                }
                None
            }
            DecodeState::CrcHigh => {
                self.crc_high = byte;
                self.state = DecodeState::CrcLow;
                None
            }
            DecodeState::CrcLow => {
                let received = ((self.crc_high as u16) << 8) | byte as u16;
                let header = [self.type_byte, self.length, self.sequence];
                let computed = crc16_continue(&self.payload, crc16(&header));
                let sequence = self.sequence;
                let event = if computed == received {
                    DecodeEvent::Packet(FramePacket {
                        type_byte: self.type_byte,
                        sequence,
                        payload: std::mem::take(&mut self.payload),
                    })
                } else {
                    DecodeEvent::CrcMismatch { sequence }
                };
                self.reset();
                Some(event)
            }
        }
    }

    /// Feed a byte slice, collecting all completed events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<DecodeEvent> {
        bytes.iter().filter_map(|&b| self.on_byte(b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(frame: &[u8]) -> DecodeEvent {
        let mut decoder = FrameDecoder::new();
        let mut events = decoder.feed(frame);
        assert_eq!(events.len(), 1, "expected exactly one event");
        events.pop().unwrap()
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut encoder = FrameEncoder::new();
        let frame = encoder
            .encode(PacketType::StatusReport, &[2, 1, 0, 50])
            .unwrap();

        let DecodeEvent::Packet(packet) = decode_one(&frame) else {
            panic!("expected valid packet");
        };
        assert_eq!(packet.packet_type(), Some(PacketType::StatusReport));
        assert_eq!(packet.sequence, 0);
        assert_eq!(packet.payload, vec![2, 1, 0, 50]);
    }

    #[test]
    fn test_empty_payload_frame() {
        let mut encoder = FrameEncoder::new();
        let frame = encoder.encode(PacketType::CmdGetStatus, &[]).unwrap();
        let DecodeEvent::Packet(packet) = decode_one(&frame) else {
            panic!("expected valid packet");
        };
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn test_reserved_bytes_in_payload() {
        let mut encoder = FrameEncoder::new();
        let payload = [0xAA, 0x55, 0xAA, 0x00, 0x55];
        let frame = encoder.encode(PacketType::UsbPacket, &payload).unwrap();

        // Exactly one unescaped sync byte on the wire: the frame leader.
        let sync_count = frame
            .iter()
            .enumerate()
            .filter(|&(i, &b)| b == SYNC_BYTE && (i == 0 || frame[i - 1] != ESCAPE_BYTE))
            .count();
        assert_eq!(sync_count, 1);

        let DecodeEvent::Packet(packet) = decode_one(&frame) else {
            panic!("expected valid packet");
        };
        assert_eq!(packet.payload, payload.to_vec());
    }

    #[test]
    fn test_sequence_increments_and_wraps() {
        let mut encoder = FrameEncoder::new();
        for expected in 0..=255u8 {
            assert_eq!(encoder.next_sequence(), expected);
            encoder.encode(PacketType::Ack, &[expected]).unwrap();
        }
        assert_eq!(encoder.next_sequence(), 0);
    }

    #[test]
    fn test_sequence_not_consumed_on_error() {
        let mut encoder = FrameEncoder::new();
        let oversized = vec![0u8; 256];
        assert_eq!(
            encoder.encode(PacketType::UsbPacket, &oversized),
            Err(ProtocolError::PayloadTooLarge { len: 256, max: 255 })
        );
        assert_eq!(encoder.next_sequence(), 0);
    }

    #[test]
    fn test_corrupted_payload_yields_crc_mismatch() {
        let mut encoder = FrameEncoder::new();
        let mut frame = encoder.encode(PacketType::StatusReport, &[1, 2, 3]).unwrap();
        // Flip a payload bit (payload starts after sync + 3 header bytes here,
        // none of which need escaping).
        frame[4] ^= 0x01;

        let DecodeEvent::CrcMismatch { sequence } = decode_one(&frame) else {
            panic!("expected CRC mismatch");
        };
        assert_eq!(sequence, 0);
    }

    #[test]
    fn test_junk_before_sync_is_ignored() {
        let mut encoder = FrameEncoder::new();
        let frame = encoder.encode(PacketType::Ack, &[7]).unwrap();
        let mut stream = vec![0x00, 0x13, 0x55 ^ 0xFF, 0x01];
        stream.extend_from_slice(&frame);

        let DecodeEvent::Packet(packet) = decode_one(&stream) else {
            panic!("expected valid packet");
        };
        assert_eq!(packet.payload, vec![7]);
    }

    #[test]
    fn test_decoder_recovers_after_mismatch() {
        let mut encoder = FrameEncoder::new();
        let mut bad = encoder.encode(PacketType::Ack, &[1]).unwrap();
        let good = encoder.encode(PacketType::Ack, &[2]).unwrap();
        *bad.last_mut().unwrap() ^= 0xFF;

        let mut decoder = FrameDecoder::new();
        let mut stream = bad;
        stream.extend_from_slice(&good);
        let events = decoder.feed(&stream);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], DecodeEvent::CrcMismatch { sequence: 0 }));
        let DecodeEvent::Packet(ref packet) = events[1] else {
            panic!("expected valid second packet");
        };
        assert_eq!(packet.sequence, 1);
        assert_eq!(packet.payload, vec![2]);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut encoder = FrameEncoder::new();
        let mut stream = Vec::new();
        for i in 0..4u8 {
            stream.extend(encoder.encode(PacketType::UsbPacket, &[i; 3]).unwrap());
        }
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(&stream);
        assert_eq!(events.len(), 4);
        for (i, event) in events.iter().enumerate() {
            let DecodeEvent::Packet(packet) = event else {
                panic!("expected packet {}", i);
            };
            assert_eq!(packet.sequence, i as u8);
            assert_eq!(packet.payload, vec![i as u8; 3]);
        }
    }

    #[test]
    fn test_max_payload_frame() {
        let mut encoder = FrameEncoder::new();
        let payload: Vec<u8> = (0..255).collect();
        let frame = encoder.encode(PacketType::UsbPacket, &payload).unwrap();
        let DecodeEvent::Packet(packet) = decode_one(&frame) else {
            panic!("expected valid packet");
        };
        assert_eq!(packet.payload, payload);
    }

    #[test]
    fn test_unknown_type_byte_still_delivered() {
        // Hand-build a frame with an unassigned type code; it must decode so
        // the dispatcher can answer NACK(INVALID_COMMAND).
        let header = [0x42u8, 0, 9];
        let crc = crc16(&header);
        let mut frame = vec![SYNC_BYTE];
        frame.extend_from_slice(&header);
        frame.push((crc >> 8) as u8);
        frame.push(crc as u8);

        let DecodeEvent::Packet(packet) = decode_one(&frame) else {
            panic!("expected valid packet");
        };
        assert_eq!(packet.type_byte, 0x42);
        assert_eq!(packet.packet_type(), None);
        assert_eq!(packet.sequence, 9);
    }
}
