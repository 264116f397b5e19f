//! Analyzer Integration Tests
//!
//! End-to-end tests for the analyzer crate covering:
//! - Configuration parsing and validation
//! - Capture pipeline feeding the host link
//! - Host command conversations over the channel bridge
//!
//! Note: These tests replicate config structures for testing since
//! the analyzer crate is a binary-only crate.
//!
//! Run with: `cargo test -p analyzer --test integration_tests`

use capture::ring::ring_buffer;
use capture::{SignalDecoder, TransactionTracker, UsbPacket, admit};
use common::{LinkEvent, OutboundFrame, create_host_bridge};
use protocol::{
    Ack, Command, DecodeEvent, FrameDecoder, FrameEncoder, MonitorConfig, PacketType,
    UsbPacketReport,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Config Structures (duplicated for testing since analyzer is binary crate)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnalyzerConfig {
    analyzer: AnalyzerSettings,
    capture: CaptureSettings,
    link: LinkSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnalyzerSettings {
    service_mode: bool,
    log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CaptureSettings {
    ring_capacity: usize,
    status_interval_secs: u64,
    #[serde(default)]
    filter: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinkSettings {
    tx_ring_capacity: usize,
}

const FULL_CONFIG: &str = r#"
[analyzer]
service_mode = true
log_level = "debug"

[capture]
ring_capacity = 8192
status_interval_secs = 2

[capture.filter]
speed = "full"
capture_control = true
capture_bulk = true
capture_interrupt = false
capture_isoc = false
addr_filter = 5
ep_filter = 0
filter_in = false
filter_out = true

[link]
tx_ring_capacity = 4096
"#;

#[test]
fn test_full_config_parses() {
    let config: AnalyzerConfig = toml::from_str(FULL_CONFIG).unwrap();
    assert!(config.analyzer.service_mode);
    assert_eq!(config.analyzer.log_level, "debug");
    assert_eq!(config.capture.ring_capacity, 8192);
    assert_eq!(config.capture.status_interval_secs, 2);
    assert_eq!(config.capture.filter.addr_filter, 5);
    assert!(config.capture.filter.filter_out);
    assert_eq!(config.link.tx_ring_capacity, 4096);
}

#[test]
fn test_config_without_filter_section_uses_default() {
    let minimal = r#"
[analyzer]
service_mode = false
log_level = "info"

[capture]
ring_capacity = 4096
status_interval_secs = 1

[link]
tx_ring_capacity = 4096
"#;
    let config: AnalyzerConfig = toml::from_str(minimal).unwrap();
    assert_eq!(config.capture.filter, MonitorConfig::default());
}

// ============================================================================
// Capture pipeline to host wire
// ============================================================================

/// Drive one packet's worth of edges onto the decoder: a sync run of seven
/// alternating bits, then each byte LSB first, then an end-of-packet gap.
/// The decoder reads the bit value as D+ != D-, so a one bit is the
/// differential state and a zero bit keeps both lines high.
fn feed_packet(
    decoder: &mut SignalDecoder,
    producer: &mut capture::ring::Producer,
    ticks: &mut u32,
    raw: &[u8],
) {
    let mut bit = |ticks: &mut u32, value: bool| {
        *ticks += 1;
        let (dp, dm) = if value { (true, false) } else { (true, true) };
        decoder.on_edge(dp, dm, *ticks, producer);
    };
    for i in 0..7 {
        bit(ticks, i % 2 == 0);
    }
    for &byte in raw {
        for position in 0..8 {
            bit(ticks, byte >> position & 1 != 0);
        }
    }
    *ticks += capture::EOP_TICKS + 5;
    decoder.on_edge(false, false, *ticks, producer);
}

fn pop_record(consumer: &mut capture::ring::Consumer) -> Option<Vec<u8>> {
    let len = consumer.peek(1)? as usize;
    if consumer.len() < len + 2 {
        return None;
    }
    let pid = consumer.pop().unwrap();
    consumer.pop().unwrap();
    let mut raw = vec![pid];
    for _ in 0..len {
        raw.push(consumer.pop().unwrap());
    }
    Some(raw)
}

/// A SETUP token for address 5, endpoint 2, with a valid CRC5.
const SETUP_TOKEN: [u8; 3] = [0x2D, 0xC9, 0x05];

#[test]
fn test_capture_to_host_wire_end_to_end() {
    // Edges in, framed report bytes out, decoded back on the host side.
    let (mut producer, mut consumer) = ring_buffer(256);
    let mut decoder = SignalDecoder::new();
    let mut ticks = 100;
    feed_packet(&mut decoder, &mut producer, &mut ticks, &SETUP_TOKEN);

    let raw = pop_record(&mut consumer).unwrap();
    let mut packet = UsbPacket::decode(&raw, 1234).unwrap();
    let mut tracker = TransactionTracker::new();
    tracker.on_packet(&mut packet);
    assert!(admit(&packet, &MonitorConfig::default()));

    let report = UsbPacketReport {
        timestamp: packet.timestamp,
        pid: packet.pid as u8,
        dev_addr: packet.dev_addr,
        endpoint: packet.endpoint,
        crc_valid: packet.crc_valid,
        data: packet.data.to_vec(),
    };
    let wire = FrameEncoder::new()
        .encode(PacketType::UsbPacket, &report.encode())
        .unwrap();

    let mut host_decoder = FrameDecoder::new();
    let events = host_decoder.feed(&wire);
    assert_eq!(events.len(), 1);
    let DecodeEvent::Packet(ref frame) = events[0] else {
        panic!("host saw a damaged frame");
    };
    assert_eq!(frame.type_byte, 0x80);
    let received = UsbPacketReport::parse(&frame.payload).unwrap();
    assert_eq!(received.timestamp, 1234);
    assert_eq!(received.pid, 0x2D);
    assert_eq!(received.dev_addr, 5);
    assert_eq!(received.endpoint, 2);
    assert!(received.crc_valid);
}

// ============================================================================
// Host command conversation
// ============================================================================

#[tokio::test]
async fn test_command_conversation_over_bridge() {
    let (bridge, worker) = create_host_bridge();

    // Host encodes a START_CAPTURE command; the RX side decodes it and
    // forwards it as a link event.
    let config = MonitorConfig {
        addr_filter: 5,
        ..Default::default()
    };
    let wire = FrameEncoder::new()
        .encode(PacketType::CmdStartCapture, &config.to_wire())
        .unwrap();
    let mut decoder = FrameDecoder::new();
    for event in decoder.feed(&wire) {
        let DecodeEvent::Packet(packet) = event else {
            panic!("command frame failed to decode");
        };
        worker.send_event(LinkEvent::Command(packet)).unwrap();
    }

    // Dispatcher side parses and acknowledges.
    let event = bridge.recv_event().await.unwrap();
    let LinkEvent::Command(packet) = event else {
        panic!("expected a command event");
    };
    let sequence = packet.sequence;
    let Command::StartCapture(Some(parsed)) = Command::parse(&packet).unwrap() else {
        panic!("expected a start capture command with a config");
    };
    assert_eq!(parsed.addr_filter, 5);

    bridge
        .send_frame(OutboundFrame::new(
            PacketType::Ack,
            Ack { sequence }.encode(),
        ))
        .await
        .unwrap();

    // The frame writer side encodes and the host decodes the ACK.
    let outbound = worker.try_recv_frame().unwrap();
    let wire = FrameEncoder::new()
        .encode(outbound.packet_type, &outbound.payload)
        .unwrap();
    let events = FrameDecoder::new().feed(&wire);
    let DecodeEvent::Packet(ref ack_frame) = events[0] else {
        panic!("acknowledgment frame failed to decode");
    };
    assert_eq!(ack_frame.type_byte, 0xF0);
    assert_eq!(Ack::parse(&ack_frame.payload).unwrap().sequence, sequence);
}
