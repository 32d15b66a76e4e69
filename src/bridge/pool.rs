//! The fixed set of slots and the in-process contract callers use.

use super::cancel::CancelToken;
use super::endpoint::Side;
use super::error::{BridgeError, BridgeResult};
use super::forward::Forwarded;
use super::history::DEFAULT_HISTORY_CAPACITY;
use super::line_config::{self, LineConfigChange};
use super::modem::{self, LineCounters, LineEvent, ModemLines, SerialInfo};
use super::slot::{PortSlot, SlotStatus};
use crate::port::{LineConfig, ReaderFactory};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_SLOT_COUNT: usize = 4;

/// Header line of [`PortSlotPool::listing`].
pub const LISTING_HEADER: &str = "vsbserinfo:1.0";

/// Sizing and behaviour knobs fixed at pool construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub slot_count: usize,
    pub history_capacity: usize,
    /// Route DTR requests to the RTS bit like the historical driver.
    pub legacy_dtr_quirk: bool,
    /// Line settings every new endpoint starts with.
    pub line: LineConfig,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            legacy_dtr_quirk: false,
            line: LineConfig::default(),
        }
    }
}

/// An open reference to one side of one slot.
///
/// Only [`PortSlotPool::acquire`] hands these out; each one should be given
/// back to [`PortSlotPool::release`] exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointHandle {
    slot: usize,
    side: Side,
}

impl EndpointHandle {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn side(&self) -> Side {
        self.side
    }
}

impl std::fmt::Display for EndpointHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.slot, self.side)
    }
}

/// Owns every slot. The only way callers reach a slot.
///
/// All methods are synchronous and take `&self`; the pool is meant to be
/// shared behind an `Arc` by concurrent callers. Only
/// [`wait_for_change`](Self::wait_for_change) blocks.
pub struct PortSlotPool {
    slots: Vec<Arc<PortSlot>>,
    readers: Arc<dyn ReaderFactory>,
    settings: PoolSettings,
}

impl PortSlotPool {
    pub fn new(settings: PoolSettings, readers: Arc<dyn ReaderFactory>) -> Self {
        let slots = (0..settings.slot_count)
            .map(|index| Arc::new(PortSlot::new(index)))
            .collect();
        debug!(
            "created pool of {} slots (history capacity {})",
            settings.slot_count, settings.history_capacity
        );
        Self {
            slots,
            readers,
            settings,
        }
    }

    pub fn with_defaults(readers: Arc<dyn ReaderFactory>) -> Self {
        Self::new(PoolSettings::default(), readers)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    fn slot(&self, index: usize) -> BridgeResult<&Arc<PortSlot>> {
        self.slots.get(index).ok_or(BridgeError::InvalidIndex {
            index,
            slots: self.slots.len(),
        })
    }

    fn slot_of(&self, handle: EndpointHandle) -> BridgeResult<&Arc<PortSlot>> {
        self.slot(handle.slot)
    }

    /// Open `side` of slot `index`.
    ///
    /// # Errors
    ///
    /// - `BridgeError::InvalidIndex` if `index` is not below the slot count
    pub fn acquire(&self, index: usize, side: Side) -> BridgeResult<EndpointHandle> {
        let slot = self.slot(index)?;
        let open_count = slot.open(side, &self.settings, self.readers.as_ref());
        debug!("slot {}: {} open count now {}", index, side, open_count);
        Ok(EndpointHandle { slot: index, side })
    }

    /// Give back one open reference. Returns the remaining open count.
    ///
    /// The last release wakes the endpoint's waiters with `PortClosed` and
    /// flushes the peer's reader. Releasing an endpoint that is not open is
    /// a logged no-op.
    pub fn release(&self, handle: EndpointHandle) -> u32 {
        match self.slot_of(handle) {
            Ok(slot) => slot.close(handle.side),
            Err(e) => {
                warn!("release of {} ignored: {}", handle, e);
                0
            }
        }
    }

    /// Forward `bytes` to the peer, reporting how the write was handled.
    pub fn forward(&self, handle: EndpointHandle, bytes: &[u8]) -> BridgeResult<Forwarded> {
        self.slot_of(handle)?.write(handle.side, bytes)
    }

    /// Forward `bytes` to the peer. Returns the number of bytes accepted.
    ///
    /// # Errors
    ///
    /// - `BridgeError::PeerNotAttached` if the peer side was never opened
    /// - `BridgeError::PortNotOpen` if this endpoint is closed
    /// - `BridgeError::ProtocolDesync` if this endpoint's echo history cannot
    ///   hold the write; nothing is delivered
    pub fn write(&self, handle: EndpointHandle, bytes: &[u8]) -> BridgeResult<usize> {
        self.forward(handle, bytes).map(|outcome| outcome.accepted())
    }

    /// Space left in this endpoint's reader queue. Advisory only.
    pub fn room(&self, handle: EndpointHandle) -> BridgeResult<usize> {
        self.slot_of(handle)?.with_open(handle.side, |ep| {
            ep.reader.as_ref().map_or(0, |reader| reader.room())
        })
    }

    pub fn get_line_config(&self, handle: EndpointHandle) -> BridgeResult<LineConfig> {
        self.slot_of(handle)?
            .with_open(handle.side, |ep| ep.line.clone())
    }

    /// Store new line settings and report what changed.
    pub fn set_line_config(
        &self,
        handle: EndpointHandle,
        config: LineConfig,
    ) -> BridgeResult<LineConfigChange> {
        let change = self.slot_of(handle)?.with_open(handle.side, |ep| {
            let change = line_config::apply_config(&config, Some(&ep.line));
            ep.line = config;
            change
        })?;

        match &change {
            LineConfigChange::Unchanged => debug!("{}: line config unchanged", handle),
            LineConfigChange::Changed(diag) => {
                debug!("{}: line config changed ({})", handle, diag.changed.join(", "));
                for line in diag.to_string().lines() {
                    debug!("{}", line);
                }
            }
        }
        Ok(change)
    }

    pub fn get_modem_bits(&self, handle: EndpointHandle) -> BridgeResult<ModemLines> {
        self.slot_of(handle)?
            .with_open(handle.side, |ep| modem::get_modem_bits(ep))
    }

    /// Raise `set` and drop `clear` among the control lines. Returns the new bits.
    pub fn set_modem_bits(
        &self,
        handle: EndpointHandle,
        set: ModemLines,
        clear: ModemLines,
    ) -> BridgeResult<ModemLines> {
        let quirk = self.settings.legacy_dtr_quirk;
        let bits = self.slot_of(handle)?.with_open(handle.side, |ep| {
            modem::set_modem_bits(ep, set, clear, quirk);
            modem::get_modem_bits(ep)
        })?;
        debug!("{}: modem bits now {:?}", handle, bits);
        Ok(bits)
    }

    /// Block until a line in `mask` changes.
    ///
    /// # Errors
    ///
    /// - `BridgeError::NoChange` if woken by a change outside the modem lines
    /// - `BridgeError::Interrupted` if `cancel` fired
    /// - `BridgeError::PortClosed` if the endpoint was closed by its last user
    /// - `BridgeError::PortNotOpen` if the endpoint is not open to begin with
    pub fn wait_for_change(
        &self,
        handle: EndpointHandle,
        mask: ModemLines,
        cancel: &CancelToken,
    ) -> BridgeResult<()> {
        self.slot_of(handle)?
            .wait_for_change(handle.side, mask, cancel)
    }

    pub fn snapshot_counts(&self, handle: EndpointHandle) -> BridgeResult<LineCounters> {
        self.slot_of(handle)?
            .with_open(handle.side, |ep| modem::snapshot_counts(ep))
    }

    pub fn describe_fake_serial(&self, handle: EndpointHandle) -> BridgeResult<SerialInfo> {
        self.slot_of(handle)?
            .with_open(handle.side, |ep| modem::describe_fake_serial(ep))
    }

    /// Feed a line-status event into this endpoint, waking its waiters if
    /// a counter moved. Returns the counters afterwards.
    pub fn inject_line_event(
        &self,
        handle: EndpointHandle,
        event: LineEvent,
    ) -> BridgeResult<LineCounters> {
        self.slot_of(handle)?.inject(handle.side, event)
    }

    /// Drop every unreconciled byte from this endpoint's echo history.
    ///
    /// Recovery step after `ProtocolDesync`; never done automatically.
    pub fn discard_history(&self, handle: EndpointHandle) -> BridgeResult<usize> {
        let dropped = self
            .slot_of(handle)?
            .with_open(handle.side, |ep| ep.history.clear())?;
        info!("{}: discarded {} history bytes", handle, dropped);
        Ok(dropped)
    }

    pub fn slot_status(&self, index: usize) -> BridgeResult<SlotStatus> {
        Ok(self.slot(index)?.status())
    }

    /// Driver report: a header line, then one line per slot that has been opened.
    pub fn listing(&self) -> String {
        let mut out = format!("{} driver:{}\n", LISTING_HEADER, env!("CARGO_PKG_VERSION"));
        for slot in self.slots.iter().filter(|slot| slot.is_materialized()) {
            let _ = writeln!(out, "{}", slot.index());
        }
        out
    }

    /// Release every outstanding open reference on every slot.
    ///
    /// Waiters wake with `PortClosed`. Returns the number of references released.
    pub fn shutdown(&self) -> usize {
        let released: usize = self.slots.iter().map(|slot| slot.shutdown()).sum();
        info!("pool shut down, {} open references released", released);
        released
    }
}

impl std::fmt::Debug for PortSlotPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortSlotPool")
            .field("slots", &self.slots.len())
            .field("settings", &self.settings)
            .finish()
    }
}
