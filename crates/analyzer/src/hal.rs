//! Hardware access seams
//!
//! The capture core never touches pins, ADCs, or serial registers; it
//! consumes line samples and byte streams through the small traits here.
//! Production wiring uses replay files and standard IO streams; tests use
//! the in-memory doubles.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow};

/// One D+/D- line transition with its tick timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub dp: bool,
    pub dm: bool,
    pub ticks: u32,
}

/// Source of line transitions for the edge pump
///
/// `next_edge` blocks until a transition is available and returns `None`
/// when the source is exhausted, which shuts the edge pump down.
pub trait EdgeSource: Send {
    fn next_edge(&mut self) -> Option<EdgeEvent>;
}

/// Bus power and instantaneous line levels, sampled by the monitor loop
pub trait PowerSense: Send {
    /// Returns `(bus_powered, dp, dm)`.
    fn sample(&mut self) -> (bool, bool, bool);
}

/// Byte stream from the host
pub trait ByteSource: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Byte stream to the host
pub trait ByteSink: Send {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
}

impl<R: Read + Send> ByteSource for R {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }
}

impl<W: Write + Send> ByteSink for W {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(self, buf)?;
        self.flush()
    }
}

/// Edge source that replays a prerecorded event list
#[derive(Debug, Default)]
pub struct ReplayEdgeSource {
    events: VecDeque<EdgeEvent>,
}

impl ReplayEdgeSource {
    pub fn new(events: Vec<EdgeEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }

    /// Load a replay file: one `<ticks> <dp> <dm>` triple per line, with
    /// `#` comments and blank lines ignored.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay file: {}", path.display()))?;
        let mut events = Vec::new();
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let event = (|| {
                let ticks = fields.next()?.parse().ok()?;
                let dp = parse_level(fields.next()?)?;
                let dm = parse_level(fields.next()?)?;
                Some(EdgeEvent { dp, dm, ticks })
            })()
            .ok_or_else(|| {
                anyhow!(
                    "{}:{}: expected '<ticks> <dp> <dm>', got '{}'",
                    path.display(),
                    number + 1,
                    line
                )
            })?;
            events.push(event);
        }
        Ok(Self::new(events))
    }
}

fn parse_level(field: &str) -> Option<bool> {
    match field {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

impl EdgeSource for ReplayEdgeSource {
    fn next_edge(&mut self) -> Option<EdgeEvent> {
        self.events.pop_front()
    }
}

/// Power sense with fixed readings, for replay mode and tests
#[derive(Debug, Clone, Copy)]
pub struct StaticPowerSense {
    pub powered: bool,
    pub dp: bool,
    pub dm: bool,
}

impl PowerSense for StaticPowerSense {
    fn sample(&mut self) -> (bool, bool, bool) {
        (self.powered, self.dp, self.dm)
    }
}

/// Power sense that steps through a scripted sample list, then holds the
/// last sample
#[derive(Debug, Default)]
pub struct ScriptedPowerSense {
    samples: VecDeque<(bool, bool, bool)>,
    last: (bool, bool, bool),
}

impl ScriptedPowerSense {
    pub fn new(samples: Vec<(bool, bool, bool)>) -> Self {
        Self {
            samples: samples.into(),
            last: (false, false, false),
        }
    }
}

impl PowerSense for ScriptedPowerSense {
    fn sample(&mut self) -> (bool, bool, bool) {
        if let Some(sample) = self.samples.pop_front() {
            self.last = sample;
        }
        self.last
    }
}
