//! usbshark Analyzer
//!
//! USB bus analyzer service. Decodes D+/D- line traffic into USB packets,
//! correlates transactions, and streams filtered capture reports to a host
//! over a framed byte link on stdin/stdout.

mod config;
mod dispatch;
mod hal;
mod link;
mod monitor;
mod service;
mod state;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use capture::ring::ring_buffer;
use clap::Parser;
use common::{create_host_bridge, setup_logging};
use tokio::signal;
use tracing::{error, info};

use hal::{EdgeSource, PowerSense, ReplayEdgeSource, StaticPowerSense};
use state::AnalyzerState;

#[derive(Parser, Debug)]
#[command(name = "usbshark-analyzer")]
#[command(author, version, about = "USB bus analyzer - capture and decode USB traffic")]
#[command(long_about = "
Decodes USB line traffic into packets, transactions, and bus state changes,
and streams them to a host over a framed stdin/stdout link.

EXAMPLES:
    # Run with default config
    usbshark-analyzer

    # Run with custom config
    usbshark-analyzer --config /path/to/analyzer.toml

    # Replay a recorded edge trace instead of live capture
    usbshark-analyzer --replay trace.edges

    # Run as systemd service
    usbshark-analyzer --service

    # Run with debug logging
    usbshark-analyzer --log-level debug

CONFIGURATION:
    The analyzer looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/usbshark/analyzer.toml
    3. /etc/usbshark/analyzer.toml
    4. Built-in defaults

For more information, visit: https://github.com/usbshark/usbshark
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Run as systemd service
    #[arg(long)]
    service: bool,

    /// Replay an edge trace file instead of capturing live
    #[arg(long, value_name = "PATH")]
    replay: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --save-config flag early (before loading config)
    if args.save_config {
        let config = config::AnalyzerConfig::default();
        let path = config::AnalyzerConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        config::AnalyzerConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        config::AnalyzerConfig::load_or_default()
    };

    // Use CLI log level if specified, otherwise use config value
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.analyzer.log_level);

    setup_logging(log_level).context("Failed to setup logging")?;

    info!("usbshark Analyzer v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    if (args.service || config.analyzer.service_mode) && service::is_systemd() {
        info!("Running under systemd");
    }

    let state = Arc::new(AnalyzerState::new(config.capture.filter));
    let running = Arc::new(AtomicBool::new(true));

    // Capture side: edge pump -> ring -> monitor loop
    let (capture_producer, capture_consumer) = ring_buffer(config.capture.ring_capacity);
    let (edges, power): (Box<dyn EdgeSource>, Box<dyn PowerSense>) =
        if let Some(ref path) = args.replay {
            info!("Replaying edge trace: {}", path.display());
            (
                Box::new(ReplayEdgeSource::from_file(path).context("Failed to load edge trace")?),
                Box::new(StaticPowerSense {
                    powered: true,
                    dp: true,
                    dm: false,
                }),
            )
        } else {
            info!("No capture backend attached, bus reads as unpowered");
            (
                Box::new(ReplayEdgeSource::new(Vec::new())),
                Box::new(StaticPowerSense {
                    powered: false,
                    dp: false,
                    dm: false,
                }),
            )
        };

    // Link side: rx pump -> dispatcher, frame writer -> tx ring -> tx pump
    let (tx_producer, tx_consumer) = ring_buffer(config.link.tx_ring_capacity);
    let (bridge, worker) = create_host_bridge();
    let worker = Arc::new(worker);

    let edge_state = Arc::clone(&state);
    let edge_handle =
        std::thread::Builder::new()
            .name("edge-pump".into())
            .spawn(move || {
                monitor::edge_pump(edges, capture_producer, edge_state);
            })?;

    let mut monitor_loop = monitor::MonitorLoop::new(
        capture_consumer,
        Arc::clone(&state),
        bridge.clone(),
        power,
        Duration::from_secs(config.capture.status_interval_secs),
        Arc::clone(&running),
    );
    let monitor_handle = std::thread::Builder::new()
        .name("monitor".into())
        .spawn(move || monitor_loop.run())?;

    let rx_worker = Arc::clone(&worker);
    // Not joined on shutdown; blocked in stdin reads until process exit.
    std::thread::Builder::new()
        .name("link-rx".into())
        .spawn(move || {
            link::rx_pump(Box::new(std::io::stdin()), &rx_worker);
        })?;

    let writer_worker = Arc::clone(&worker);
    let writer_handle = std::thread::Builder::new()
        .name("frame-writer".into())
        .spawn(move || {
            link::frame_writer(&writer_worker, tx_producer);
        })?;

    let tx_running = Arc::clone(&running);
    let tx_handle = std::thread::Builder::new()
        .name("link-tx".into())
        .spawn(move || {
            link::tx_pump(tx_consumer, Box::new(std::io::stdout()), tx_running);
        })?;

    let dispatcher_handle = tokio::spawn(dispatch::run_dispatcher(
        bridge.clone(),
        Arc::clone(&state),
    ));
    let watchdog_handle = service::spawn_watchdog_task(Arc::clone(&state));

    service::notify_ready().context("Failed to notify systemd ready")?;
    service::notify_status("Running - awaiting host commands")
        .context("Failed to send status to systemd")?;

    info!("Press Ctrl+C to shutdown");
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
        Err(e) => {
            error!("Error waiting for Ctrl+C: {}", e);
        }
    }

    service::notify_stopping().context("Failed to notify systemd stopping")?;

    running.store(false, Ordering::Relaxed);
    watchdog_handle.abort();
    dispatcher_handle.abort();

    if let Err(e) = monitor_handle.join() {
        error!("Monitor thread panicked: {:?}", e);
    }
    // The frame writer exits once every HostBridge clone is gone.
    drop(bridge);
    if let Err(e) = writer_handle.join() {
        error!("Frame writer thread panicked: {:?}", e);
    }
    if let Err(e) = tx_handle.join() {
        error!("TX pump thread panicked: {:?}", e);
    }
    if !edge_handle.is_finished() {
        info!("Edge pump still draining, detaching");
    } else if let Err(e) = edge_handle.join() {
        error!("Edge pump thread panicked: {:?}", e);
    }

    info!("Analyzer shutdown complete");
    Ok(())
}
