//! Common utilities for usbshark
//!
//! This crate provides shared functionality between the capture pipeline and
//! the analyzer runtime: error handling, logging setup, the capture clock,
//! and the async channel bridge between the Tokio control plane and the
//! blocking link threads.

pub mod channel;
pub mod clock;
pub mod error;
pub mod logging;

pub use channel::{HostBridge, LinkEvent, LinkWorker, OutboundFrame, create_host_bridge};
pub use clock::MonotonicClock;
pub use error::{Error, Result};
pub use logging::setup_logging;
