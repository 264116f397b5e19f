//! Capture pipeline threads
//!
//! The edge pump turns line transitions into framed raw packets inside the
//! capture ring; the monitor loop drains that ring, decodes and correlates
//! packets, applies the capture filter, and queues reports for the host.
//! Between them sits only the SPSC ring, so the pump side never blocks on
//! protocol work.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use capture::ring::{Consumer, Producer};
use capture::{BusEvent, BusMonitor, SignalDecoder, SignalEvent, TrackerEvent, TransactionTracker, UsbPacket, admit};
use common::{HostBridge, OutboundFrame};
use protocol::{ErrorCode, ErrorReport, PacketType, StateChange, StatusReport, UsbPacketReport};
use tracing::{debug, info, trace, warn};

use crate::hal::{EdgeSource, PowerSense};
use crate::state::AnalyzerState;

/// Upper bound on packets decoded per monitor iteration, so a saturated
/// ring cannot starve bus state sampling and status reporting.
pub const MAX_PACKETS_PER_ITERATION: usize = 16;

const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Feed line transitions through the signal decoder into the capture ring.
///
/// Runs until the edge source is exhausted. Edges arriving while capture is
/// disabled are discarded before they reach the decoder.
pub fn edge_pump(
    mut edges: Box<dyn EdgeSource>,
    mut ring: Producer,
    state: Arc<AnalyzerState>,
) {
    let mut decoder = SignalDecoder::new();

    while let Some(edge) = edges.next_edge() {
        if !state.is_monitoring() {
            continue;
        }
        if let Some(SignalEvent::BusReset) = decoder.on_edge(edge.dp, edge.dm, edge.ticks, &mut ring)
        {
            state.bus_reset.store(true, Ordering::Relaxed);
        }
    }

    debug!(
        dropped = decoder.dropped_packets(),
        overflows = ring.overflow_count(),
        "edge source exhausted, edge pump exiting"
    );
}

/// The packet processing half of the capture pipeline.
pub struct MonitorLoop {
    ring: Consumer,
    state: Arc<AnalyzerState>,
    bridge: HostBridge,
    power: Box<dyn PowerSense>,
    tracker: TransactionTracker,
    bus: BusMonitor,
    status_interval: Duration,
    running: Arc<AtomicBool>,
}

impl MonitorLoop {
    pub fn new(
        ring: Consumer,
        state: Arc<AnalyzerState>,
        bridge: HostBridge,
        power: Box<dyn PowerSense>,
        status_interval: Duration,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            ring,
            state,
            bridge,
            power,
            tracker: TransactionTracker::new(),
            bus: BusMonitor::new(),
            status_interval,
            running,
        }
    }

    pub fn run(&mut self) {
        let mut last_status = Instant::now();

        while self.running.load(Ordering::Relaxed) {
            if self.state.reset_rings.swap(false, Ordering::Relaxed) {
                self.ring.reset();
                self.tracker.on_bus_reset();
                debug!("capture buffers flushed");
            }

            let (powered, dp, dm) = self.power.sample();
            if let Some(event) = self.bus.sample(powered, dp, dm) {
                self.state
                    .device_count
                    .store(self.bus.device_count(), Ordering::Relaxed);
                let change = match event {
                    BusEvent::Connected(speed) => {
                        info!(?speed, "device connected");
                        StateChange::Connected(speed)
                    }
                    BusEvent::Disconnected => {
                        info!("device disconnected");
                        StateChange::Disconnected
                    }
                };
                if !self.send(PacketType::UsbStateChange, change.encode()) {
                    return;
                }
            }

            if self.state.bus_reset.swap(false, Ordering::Relaxed) {
                self.tracker.on_bus_reset();
                if !self.send(PacketType::UsbStateChange, StateChange::BusReset.encode()) {
                    return;
                }
            }

            let mut processed = 0;
            while processed < MAX_PACKETS_PER_ITERATION {
                let Some(record) = self.pop_record() else {
                    break;
                };
                if !self.process_record(&record) {
                    return;
                }
                processed += 1;
            }

            let pending = self.ring.len().min(u16::MAX as usize) as u16;
            self.state.buffer_usage.store(pending, Ordering::Relaxed);

            if self.state.fatal.load(Ordering::Relaxed) {
                self.handle_fatal();
                return;
            }

            if last_status.elapsed() >= self.status_interval {
                last_status = Instant::now();
                let report = StatusReport {
                    device_count: self.state.device_count.load(Ordering::Relaxed),
                    capture_state: self.state.capture_state() as u8,
                    buffer_usage: pending,
                };
                if !self.send(PacketType::StatusReport, report.encode()) {
                    return;
                }
            }

            if processed == 0 {
                std::thread::sleep(IDLE_SLEEP);
            }
        }
        debug!("monitor loop exiting");
    }

    /// Pop one framed `[PID][len][payload]` record, or `None` if the ring
    /// does not yet hold a complete record.
    fn pop_record(&mut self) -> Option<Vec<u8>> {
        let len = self.ring.peek(1)? as usize;
        if self.ring.len() < len + 2 {
            return None;
        }
        let mut record = vec![0u8; len + 2];
        self.ring.pop_slice(&mut record);
        Some(record)
    }

    /// Decode, correlate, filter, and report one raw packet record.
    ///
    /// Returns `false` when the host link is gone and the loop should stop.
    fn process_record(&mut self, record: &[u8]) -> bool {
        let mut raw = Vec::with_capacity(record.len() - 1);
        raw.push(record[0]);
        raw.extend_from_slice(&record[2..]);

        let timestamp = self.state.clock.now_micros();
        let Some(mut packet) = UsbPacket::decode(&raw, timestamp) else {
            trace!(pid = record[0], "undecodable record dropped");
            return true;
        };

        match self.tracker.on_packet(&mut packet) {
            Some(TrackerEvent::Setup(request)) => {
                debug!(
                    bm_request_type = request.bm_request_type,
                    b_request = request.b_request,
                    "setup request"
                );
            }
            Some(TrackerEvent::Completed(transaction)) => {
                trace!(kind = ?transaction.kind, addr = transaction.addr, "transaction complete");
            }
            None => {}
        }

        if !admit(&packet, &self.state.config()) {
            return true;
        }

        let report = UsbPacketReport {
            timestamp: packet.timestamp,
            pid: packet.pid as u8,
            dev_addr: packet.dev_addr,
            endpoint: packet.endpoint,
            crc_valid: packet.crc_valid,
            data: packet.data.to_vec(),
        };
        self.send(PacketType::UsbPacket, report.encode())
    }

    fn handle_fatal(&mut self) {
        warn!("fatal error flagged, capture stopped");
        self.state.monitoring.store(false, Ordering::Relaxed);
        let report = ErrorReport {
            code: ErrorCode::Timeout,
            context: 0,
        };
        self.send(PacketType::ErrorReport, report.encode());
    }

    fn send(&self, packet_type: PacketType, payload: Vec<u8>) -> bool {
        if self
            .bridge
            .send_frame_blocking(OutboundFrame::new(packet_type, payload))
            .is_err()
        {
            debug!("frame channel closed, monitor loop stopping");
            return false;
        }
        true
    }
}
