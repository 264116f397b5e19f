//! Host command dispatch
//!
//! The dispatcher is the async half of the control plane: it consumes link
//! events from the RX pump, applies command side effects to the shared
//! state, and queues the ACK/NACK and solicited reports for the frame
//! writer. Every received command frame is answered exactly once, echoing
//! the sequence number the host sent.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Result;
use common::{HostBridge, LinkEvent, OutboundFrame};
use protocol::{Ack, Command, ErrorCode, Nack, PacketType, StatusReport};
use tracing::{debug, info, warn};

use crate::state::AnalyzerState;

pub async fn run_dispatcher(bridge: HostBridge, state: Arc<AnalyzerState>) -> Result<()> {
    loop {
        let Ok(event) = bridge.recv_event().await else {
            debug!("link event channel closed, dispatcher exiting");
            return Ok(());
        };

        match event {
            LinkEvent::CrcError { sequence } => {
                debug!(sequence, "NACKing damaged frame");
                send_nack(&bridge, sequence, ErrorCode::CrcFailure).await;
            }
            LinkEvent::Command(packet) => {
                let sequence = packet.sequence;
                match Command::parse(&packet) {
                    Ok(command) => handle_command(&bridge, &state, sequence, command).await,
                    Err(e) => {
                        warn!(type_byte = packet.type_byte, sequence, "bad command: {}", e);
                        send_nack(&bridge, sequence, ErrorCode::InvalidCommand).await;
                    }
                }
            }
        }
    }
}

async fn handle_command(
    bridge: &HostBridge,
    state: &AnalyzerState,
    sequence: u8,
    command: Command,
) {
    match command {
        Command::Reset => {
            info!("host requested reset");
            state.monitoring.store(false, Ordering::Relaxed);
            state.reset_rings.store(true, Ordering::Relaxed);
            state.clock.reset();
            send_ack(bridge, sequence).await;
        }
        Command::StartCapture(config) => {
            // A command without a config record selects the built-in default.
            state.set_config(config.unwrap_or_default());
            state.reset_rings.store(true, Ordering::Relaxed);
            state.clock.reset();
            state.monitoring.store(true, Ordering::Relaxed);
            info!(config = ?state.config(), "capture started");
            send_ack(bridge, sequence).await;
        }
        Command::StopCapture => {
            state.monitoring.store(false, Ordering::Relaxed);
            info!("capture stopped");
            send_ack(bridge, sequence).await;
        }
        Command::SetFilter(config) => {
            debug!(?config, "filter replaced");
            state.set_config(config);
            send_ack(bridge, sequence).await;
        }
        Command::GetStatus => {
            send_ack(bridge, sequence).await;
            let report = StatusReport {
                device_count: state.device_count.load(Ordering::Relaxed),
                capture_state: state.capture_state() as u8,
                buffer_usage: state.buffer_usage.load(Ordering::Relaxed),
            };
            send(
                bridge,
                OutboundFrame::new(PacketType::StatusReport, report.encode()),
            )
            .await;
        }
        Command::SetTimestamp(micros) => {
            state.clock.set_micros(micros);
            debug!(micros, "clock rebased by host");
            send_ack(bridge, sequence).await;
        }
        Command::SetConfig(payload) => {
            // Reserved record; accepted so hosts can probe for support.
            debug!(bytes = payload.len(), "config record accepted");
            send_ack(bridge, sequence).await;
        }
    }
}

async fn send_ack(bridge: &HostBridge, sequence: u8) {
    send(
        bridge,
        OutboundFrame::new(PacketType::Ack, Ack { sequence }.encode()),
    )
    .await;
}

async fn send_nack(bridge: &HostBridge, sequence: u8, code: ErrorCode) {
    send(
        bridge,
        OutboundFrame::new(PacketType::Nack, Nack { sequence, code }.encode()),
    )
    .await;
}

async fn send(bridge: &HostBridge, frame: OutboundFrame) {
    if bridge.send_frame(frame).await.is_err() {
        debug!("frame channel closed, response dropped");
    }
}
