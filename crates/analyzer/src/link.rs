//! Host link pumps
//!
//! Three blocking threads own the serial byte paths:
//!
//! - the RX pump reads host bytes, runs the frame decoder FSM, and hands
//!   validated command frames (or CRC failures) to the dispatcher;
//! - the frame writer is the single owner of the [`FrameEncoder`], so every
//!   outbound frame gets its sequence number from one counter no matter
//!   which task produced it, and writes encoded bytes into the TX ring;
//! - the TX pump drains the TX ring into the byte sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use capture::ring::{Consumer, Producer};
use common::{LinkEvent, LinkWorker};
use protocol::{DecodeEvent, FrameDecoder, FrameEncoder};
use tracing::{debug, info, trace, warn};

use crate::hal::{ByteSink, ByteSource};

const RX_CHUNK: usize = 256;
const TX_CHUNK: usize = 256;
const TX_IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Read host bytes and feed the frame decoder until the source ends.
pub fn rx_pump(mut source: Box<dyn ByteSource>, worker: &LinkWorker) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; RX_CHUNK];

    loop {
        let count = match source.read(&mut buf) {
            Ok(0) => {
                info!("host link closed");
                return;
            }
            Ok(count) => count,
            Err(e) => {
                warn!("host link read failed: {}", e);
                return;
            }
        };

        for event in decoder.feed(&buf[..count]) {
            let link_event = match event {
                DecodeEvent::Packet(packet) => {
                    trace!(type_byte = packet.type_byte, seq = packet.sequence, "frame received");
                    LinkEvent::Command(packet)
                }
                DecodeEvent::CrcMismatch { sequence } => {
                    debug!(sequence, "frame failed checksum");
                    LinkEvent::CrcError { sequence }
                }
            };
            if worker.send_event(link_event).is_err() {
                // Dispatcher is gone; nothing left to deliver to.
                return;
            }
        }
    }
}

/// Encode queued frames into the TX ring.
///
/// Runs until every [`HostBridge`](common::HostBridge) clone is dropped. A
/// frame that does not fit in the ring is dropped whole; a partial frame
/// would corrupt the escape framing for everything after it.
pub fn frame_writer(worker: &LinkWorker, mut tx_ring: Producer) {
    let mut encoder = FrameEncoder::new();

    while let Ok(outbound) = worker.recv_frame() {
        let wire = match encoder.encode(outbound.packet_type, &outbound.payload) {
            Ok(wire) => wire,
            Err(e) => {
                warn!("unencodable frame dropped: {}", e);
                continue;
            }
        };
        if tx_ring.free() < wire.len() {
            warn!(
                packet_type = ?outbound.packet_type,
                bytes = wire.len(),
                "tx ring full, frame dropped"
            );
            continue;
        }
        tx_ring.push_slice(&wire);
    }
    debug!("frame writer shutting down");
}

/// Drain the TX ring into the host byte sink.
pub fn tx_pump(mut tx_ring: Consumer, mut sink: Box<dyn ByteSink>, running: Arc<AtomicBool>) {
    let mut buf = [0u8; TX_CHUNK];

    while running.load(Ordering::Relaxed) {
        let count = tx_ring.pop_slice(&mut buf);
        if count == 0 {
            std::thread::sleep(TX_IDLE_SLEEP);
            continue;
        }
        if let Err(e) = sink.write_all(&buf[..count]) {
            warn!("host link write failed: {}", e);
            return;
        }
    }
}
