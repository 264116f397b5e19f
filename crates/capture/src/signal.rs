//! Differential edge stream to raw packet bytes
//!
//! The edge pump feeds every D+/D- transition into [`SignalDecoder::on_edge`]
//! together with a tick timestamp. The decoder hunts for the sync pattern,
//! accumulates bits into bytes, and on end-of-packet flushes one framed
//! record into the capture ring:
//!
//! ```text
//! [PID][payload_len][payload bytes...]
//! ```
//!
//! CRC bytes are not stripped here; they ride along as payload and are
//! checked by the packet decoder. The bit value is the instantaneous
//! `dp != dm` level. This is deliberately not NRZI decoding and performs no
//! bit-unstuffing; it reproduces what the sampling front end actually
//! captures.

use tracing::{debug, trace};

use crate::ring::Producer;

/// SE0 held longer than this many ticks ends the packet in progress.
pub const EOP_TICKS: u32 = 20;

/// SE0 held longer than this many ticks is a bus reset.
pub const RESET_TICKS: u32 = 250;

/// Longest raw packet the decoder will accumulate, PID included.
pub const MAX_PACKET_BYTES: usize = 64;

/// Alternating samples required before the decoder locks on.
const SYNC_BITS: u8 = 7;

/// Out-of-band conditions detected from line state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    BusReset,
}

/// Edge-driven packet reassembly state machine
#[derive(Debug)]
pub struct SignalDecoder {
    sync_detected: bool,
    packet_in_progress: bool,
    /// Consecutive alternating samples seen while hunting for sync.
    sync_run: u8,
    last_bit: bool,
    bit_count: u8,
    current_byte: u8,
    packet: [u8; MAX_PACKET_BYTES],
    byte_count: usize,
    last_edge_ticks: u32,
    dropped_packets: usize,
}

impl SignalDecoder {
    pub fn new() -> Self {
        Self {
            sync_detected: false,
            packet_in_progress: false,
            sync_run: 0,
            last_bit: false,
            bit_count: 0,
            current_byte: 0,
            packet: [0; MAX_PACKET_BYTES],
            byte_count: 0,
            last_edge_ticks: 0,
            dropped_packets: 0,
        }
    }

    /// Process one line transition.
    ///
    /// `ticks` is a free-running monotonic tick count; only differences
    /// matter. Completed packets are written into `producer` as framed
    /// records. Returns a [`SignalEvent`] when the line state itself means
    /// something (currently only bus reset).
    pub fn on_edge(
        &mut self,
        dp: bool,
        dm: bool,
        ticks: u32,
        producer: &mut Producer,
    ) -> Option<SignalEvent> {
        let time_diff = ticks.wrapping_sub(self.last_edge_ticks);
        self.last_edge_ticks = ticks;

        if !dp && !dm {
            let mut event = None;
            if time_diff > EOP_TICKS {
                if self.packet_in_progress && self.byte_count > 0 {
                    self.flush(producer);
                }
                if time_diff > RESET_TICKS {
                    debug!(ticks = time_diff, "bus reset condition on line");
                    event = Some(SignalEvent::BusReset);
                }
            }
            self.sync_detected = false;
            self.packet_in_progress = false;
            self.sync_run = 0;
            self.bit_count = 0;
            self.current_byte = 0;
            self.byte_count = 0;
            return event;
        }

        let bit = dp != dm;
        if !self.sync_detected {
            if self.sync_run == 0 || bit != self.last_bit {
                self.sync_run += 1;
            } else {
                self.sync_run = 1;
            }
            self.last_bit = bit;
            if self.sync_run >= SYNC_BITS {
                trace!("sync pattern locked");
                self.sync_detected = true;
                self.packet_in_progress = true;
                self.bit_count = 0;
                self.current_byte = 0;
                self.byte_count = 0;
            }
            return None;
        }

        // Bits arrive LSB first within each byte.
        self.current_byte |= (bit as u8) << self.bit_count;
        self.bit_count += 1;
        if self.bit_count == 8 {
            if self.byte_count < MAX_PACKET_BYTES {
                self.packet[self.byte_count] = self.current_byte;
                self.byte_count += 1;
            }
            self.bit_count = 0;
            self.current_byte = 0;
        }
        None
    }

    /// Write the accumulated packet into the ring as one record, or drop it
    /// whole if the ring cannot take the entire record. A partial record
    /// would desynchronize the consumer's framing, so tearing is never
    /// allowed.
    fn flush(&mut self, producer: &mut Producer) {
        let record_len = self.byte_count + 1;
        if producer.free() < record_len {
            self.dropped_packets += 1;
            debug!(
                bytes = self.byte_count,
                dropped = self.dropped_packets,
                "capture ring full, packet dropped"
            );
            return;
        }
        producer.push(self.packet[0]);
        producer.push((self.byte_count - 1) as u8);
        producer.push_slice(&self.packet[1..self.byte_count]);
        trace!(pid = self.packet[0], len = self.byte_count - 1, "packet queued");
    }

    /// Packets dropped because the ring was full.
    pub fn dropped_packets(&self) -> usize {
        self.dropped_packets
    }

    pub fn packet_in_progress(&self) -> bool {
        self.packet_in_progress
    }
}

impl Default for SignalDecoder {
    fn default() -> Self {
        Self::new()
    }
}
