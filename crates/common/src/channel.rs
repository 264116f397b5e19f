//! Async channel bridge between the Tokio control plane and link threads
//!
//! Received command frames travel from the blocking RX pump thread up to the
//! async dispatcher, and outbound report/acknowledgment frames travel from
//! the dispatcher (and the monitor loop) down to the blocking frame writer.
//! The writer owns the frame encoder, so every outbound frame passes through
//! one sequence counter regardless of which task produced it.

use async_channel::{Receiver, Sender, bounded};
use protocol::{FramePacket, PacketType};

/// Events from the link RX pump to the dispatcher
#[derive(Debug)]
pub enum LinkEvent {
    /// A complete frame passed its checksum
    Command(FramePacket),

    /// A frame failed its checksum; carries the received sequence byte so
    /// the dispatcher can NACK it
    CrcError {
        /// Sequence field of the damaged frame
        sequence: u8,
    },
}

/// An outbound frame, not yet encoded
///
/// The frame writer assigns the sequence number and does the byte stuffing.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub packet_type: PacketType,
    pub payload: Vec<u8>,
}

impl OutboundFrame {
    pub fn new(packet_type: PacketType, payload: Vec<u8>) -> Self {
        Self {
            packet_type,
            payload,
        }
    }
}

/// Handle for the Tokio control plane (async)
#[derive(Clone)]
pub struct HostBridge {
    event_rx: Receiver<LinkEvent>,
    frame_tx: Sender<OutboundFrame>,
}

impl HostBridge {
    /// Receive the next link event from the RX pump
    pub async fn recv_event(&self) -> crate::Result<LinkEvent> {
        self.event_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Queue a frame for transmission
    pub async fn send_frame(&self, frame: OutboundFrame) -> crate::Result<()> {
        self.frame_tx
            .send(frame)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Queue a frame from a blocking thread
    ///
    /// The monitor loop uses this to emit reports without entering the
    /// async runtime.
    pub fn send_frame_blocking(&self, frame: OutboundFrame) -> crate::Result<()> {
        self.frame_tx
            .send_blocking(frame)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Handle for the link threads (blocking)
pub struct LinkWorker {
    /// Event sender for the RX pump thread
    pub event_tx: Sender<LinkEvent>,
    pub(crate) frame_rx: Receiver<OutboundFrame>,
}

impl LinkWorker {
    /// Send a link event to the dispatcher (blocking)
    pub fn send_event(&self, event: LinkEvent) -> crate::Result<()> {
        self.event_tx
            .send_blocking(event)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Receive the next outbound frame (blocking)
    ///
    /// Returns an error once every sender is dropped, which is the frame
    /// writer's shutdown signal.
    pub fn recv_frame(&self) -> crate::Result<OutboundFrame> {
        self.frame_rx
            .recv_blocking()
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Try to receive an outbound frame without blocking
    pub fn try_recv_frame(&self) -> Option<OutboundFrame> {
        self.frame_rx.try_recv().ok()
    }
}

/// Create the channel bridge between the control plane and the link threads
///
/// Returns (HostBridge for Tokio, LinkWorker for the link threads)
pub fn create_host_bridge() -> (HostBridge, LinkWorker) {
    let (event_tx, event_rx) = bounded(256);
    let (frame_tx, frame_rx) = bounded(256);

    (
        HostBridge { event_rx, frame_tx },
        LinkWorker { event_tx, frame_rx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_flows_to_dispatcher() {
        let (bridge, worker) = create_host_bridge();

        let handle = std::thread::spawn(move || {
            worker
                .send_event(LinkEvent::CrcError { sequence: 9 })
                .unwrap();
        });

        let event = bridge.recv_event().await.unwrap();
        let LinkEvent::CrcError { sequence } = event else {
            panic!("expected a CRC error event");
        };
        assert_eq!(sequence, 9);
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn test_frame_flows_to_writer() {
        let (bridge, worker) = create_host_bridge();

        bridge
            .send_frame(OutboundFrame::new(PacketType::Ack, vec![3]))
            .await
            .unwrap();

        let handle = std::thread::spawn(move || worker.recv_frame().unwrap());
        let frame = handle.join().unwrap();
        assert_eq!(frame.packet_type, PacketType::Ack);
        assert_eq!(frame.payload, vec![3]);
    }

    #[tokio::test]
    async fn test_blocking_send_from_monitor_thread() {
        let (bridge, worker) = create_host_bridge();

        let handle = std::thread::spawn(move || {
            bridge
                .send_frame_blocking(OutboundFrame::new(
                    PacketType::StatusReport,
                    vec![1, 0, 0, 0],
                ))
                .unwrap();
        });
        handle.join().unwrap();

        let frame = worker.try_recv_frame().unwrap();
        assert_eq!(frame.packet_type, PacketType::StatusReport);
    }
}
