//! Per-side endpoint state.

use super::history::EchoHistory;
use super::modem::{LineCounters, Mcr, Msr, SerialShadow};
use crate::port::{LineConfig, ReaderHandle};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which end of a slot an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The emulated embedded agent.
    Device,
    /// The test harness driving the agent.
    Commander,
}

impl Side {
    pub fn peer(self) -> Side {
        match self {
            Side::Device => Side::Commander,
            Side::Commander => Side::Device,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Device => write!(f, "device"),
            Side::Commander => write!(f, "commander"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "device" | "dev" => Ok(Side::Device),
            "commander" | "cmd" => Ok(Side::Commander),
            other => Err(format!("unknown side '{other}' (expected device or commander)")),
        }
    }
}

/// Mutable state of one side of a slot.
///
/// Only ever touched with the owning slot's lock held.
pub struct Endpoint {
    pub(crate) side: Side,
    pub(crate) open_count: u32,
    /// Installed on the first open of each lifecycle, kept after last close.
    pub(crate) reader: Option<Box<dyn ReaderHandle>>,
    pub(crate) mcr: Mcr,
    pub(crate) msr: Msr,
    pub(crate) icount: LineCounters,
    /// Buffer overruns reported by line events, as opposed to reader-queue drops.
    pub(crate) signalled_overruns: u64,
    /// Callers parked in a status wait.
    pub(crate) waiters: usize,
    /// Bumped on every last close; waiters compare it to detect hang-up.
    pub(crate) hangups: u64,
    pub(crate) history: EchoHistory,
    pub(crate) line: LineConfig,
    pub(crate) serial: SerialShadow,
}

impl Endpoint {
    pub(crate) fn new(slot: usize, side: Side, history_capacity: usize, line: LineConfig) -> Self {
        Self {
            side,
            open_count: 0,
            reader: None,
            mcr: Mcr::empty(),
            msr: Msr::empty(),
            icount: LineCounters::default(),
            signalled_overruns: 0,
            waiters: 0,
            hangups: 0,
            history: EchoHistory::new(history_capacity),
            line,
            serial: SerialShadow {
                line: slot as u32,
                ..Default::default()
            },
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn open_count(&self) -> u32 {
        self.open_count
    }

    pub fn is_open(&self) -> bool {
        self.open_count > 0
    }

    pub fn is_attached(&self) -> bool {
        self.reader.is_some()
    }

    pub fn history(&self) -> &EchoHistory {
        &self.history
    }

    pub fn line_config(&self) -> &LineConfig {
        &self.line
    }

    /// Push staged bytes to the reader, if one is attached.
    pub(crate) fn flush_reader(&mut self) {
        if let Some(reader) = self.reader.as_mut() {
            reader.flush();
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("side", &self.side)
            .field("open_count", &self.open_count)
            .field("attached", &self.reader.is_some())
            .field("mcr", &self.mcr)
            .field("msr", &self.msr)
            .field("history_len", &self.history.len())
            .field("waiters", &self.waiters)
            .finish()
    }
}
