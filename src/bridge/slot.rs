//! One device/commander pair and the lock that serializes it.

use super::cancel::CancelToken;
use super::endpoint::{Endpoint, Side};
use super::error::{BridgeError, BridgeResult};
use super::forward::{self, Forwarded};
use super::modem::{self, classify_wake, LineCounters, LineEvent, Mcr, ModemLines, WakeVerdict};
use super::pool::PoolSettings;
use crate::port::ReaderFactory;
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Both endpoints of a slot. Endpoints are created on first open and kept
/// until the pool is dropped.
#[derive(Debug, Default)]
pub(crate) struct SlotState {
    pub(crate) device: Option<Endpoint>,
    pub(crate) commander: Option<Endpoint>,
}

impl SlotState {
    fn entry(&mut self, side: Side) -> &mut Option<Endpoint> {
        match side {
            Side::Device => &mut self.device,
            Side::Commander => &mut self.commander,
        }
    }

    pub(crate) fn endpoint(&self, side: Side) -> Option<&Endpoint> {
        match side {
            Side::Device => self.device.as_ref(),
            Side::Commander => self.commander.as_ref(),
        }
    }

    pub(crate) fn endpoint_mut(&mut self, side: Side) -> Option<&mut Endpoint> {
        self.entry(side).as_mut()
    }

    /// `(source, peer)` borrowed together.
    pub(crate) fn split_mut(&mut self, source: Side) -> (Option<&mut Endpoint>, Option<&mut Endpoint>) {
        let (device, commander) = (self.device.as_mut(), self.commander.as_mut());
        match source {
            Side::Device => (device, commander),
            Side::Commander => (commander, device),
        }
    }
}

/// A slot: one lock guarding both endpoints, plus one condition variable per
/// side for status waiters.
///
/// Locks are never held across two slots.
pub struct PortSlot {
    index: usize,
    state: Mutex<SlotState>,
    device_changed: Condvar,
    commander_changed: Condvar,
}

/// Per-endpoint status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointStatus {
    pub open_count: u32,
    pub attached: bool,
    pub history_len: usize,
    pub history_capacity: usize,
    pub modem_bits: u32,
    pub waiters: usize,
}

/// Status report of a slot. `None` means that side was never opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub index: usize,
    pub device: Option<EndpointStatus>,
    pub commander: Option<EndpointStatus>,
}

fn open_endpoint(state: &mut SlotState, slot: usize, side: Side) -> BridgeResult<&mut Endpoint> {
    match state.endpoint_mut(side) {
        Some(ep) if ep.is_open() => Ok(ep),
        _ => Err(BridgeError::PortNotOpen { slot, side }),
    }
}

impl PortSlot {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            state: Mutex::new(SlotState::default()),
            device_changed: Condvar::new(),
            commander_changed: Condvar::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock()
    }

    fn changed(&self, side: Side) -> &Condvar {
        match side {
            Side::Device => &self.device_changed,
            Side::Commander => &self.commander_changed,
        }
    }

    /// Wake `side`'s waiters after taking the lock, so no waiter can miss it.
    pub(crate) fn notify_locked(&self, side: Side) {
        let _state = self.lock();
        self.changed(side).notify_all();
    }

    /// Whether either endpoint has ever been opened.
    pub fn is_materialized(&self) -> bool {
        let state = self.lock();
        state.device.is_some() || state.commander.is_some()
    }

    /// Open `side`, creating its endpoint on first use. Returns the new open count.
    pub(crate) fn open(&self, side: Side, settings: &PoolSettings, readers: &dyn ReaderFactory) -> u32 {
        let mut state = self.lock();
        let index = self.index;
        let ep = state.entry(side).get_or_insert_with(|| {
            debug!("slot {}: creating {} endpoint", index, side);
            Endpoint::new(index, side, settings.history_capacity, settings.line.clone())
        });

        if ep.open_count == 0 {
            ep.reader = Some(readers.attach(index, side));
            info!("slot {}: {} opened", index, side);
        }
        ep.open_count += 1;
        ep.open_count
    }

    /// Drop one open reference of `side`. Returns the remaining count.
    pub(crate) fn close(&self, side: Side) -> u32 {
        let mut state = self.lock();
        match self.release_locked(&mut state, side) {
            Some(remaining) => remaining,
            None => {
                warn!("slot {}: close of {} with no open references ignored", self.index, side);
                0
            }
        }
    }

    /// `None` if `side` had no open reference.
    fn release_locked(&self, state: &mut SlotState, side: Side) -> Option<u32> {
        let ep = state.endpoint_mut(side).filter(|ep| ep.is_open())?;
        ep.open_count -= 1;
        let remaining = ep.open_count;
        if remaining > 0 {
            return Some(remaining);
        }

        ep.hangups += 1;
        if ep.line.hangup_on_close {
            ep.mcr.remove(Mcr::DTR | Mcr::RTS);
        }
        let waiters = ep.waiters;

        if let Some(peer) = state.endpoint_mut(side.peer()) {
            peer.flush_reader();
        }
        self.changed(side).notify_all();

        info!(
            "slot {}: {} closed by last user ({} waiters released)",
            self.index, side, waiters
        );
        Some(0)
    }

    pub(crate) fn write(&self, side: Side, bytes: &[u8]) -> BridgeResult<Forwarded> {
        let mut state = self.lock();
        forward::forward(&mut state, self.index, side, bytes)
    }

    /// Run `f` on `side`'s endpoint under the lock. The endpoint must be open.
    pub(crate) fn with_open<R>(&self, side: Side, f: impl FnOnce(&mut Endpoint) -> R) -> BridgeResult<R> {
        let mut state = self.lock();
        let ep = open_endpoint(&mut state, self.index, side)?;
        Ok(f(ep))
    }

    /// Apply an injected line event and wake `side`'s waiters if a counter moved.
    pub(crate) fn inject(&self, side: Side, event: LineEvent) -> BridgeResult<LineCounters> {
        let mut state = self.lock();
        let ep = open_endpoint(&mut state, self.index, side)?;
        let changed = modem::apply_line_event(ep, event);
        let counts = ep.icount;
        if changed {
            debug!("slot {}: {} line event {:?}", self.index, side, event);
            self.changed(side).notify_all();
        }
        Ok(counts)
    }

    /// Block until a watched modem line changes, the endpoint closes, or
    /// `cancel` fires.
    ///
    /// The counter snapshot is taken under the lock; the lock is released
    /// while parked and re-taken only to re-read state.
    pub(crate) fn wait_for_change(
        self: &Arc<Self>,
        side: Side,
        mask: ModemLines,
        cancel: &CancelToken,
    ) -> BridgeResult<()> {
        let _parked = cancel.park(self, side);
        let mut state = self.lock();

        let (mut prev, hangups) = {
            let ep = open_endpoint(&mut state, self.index, side)?;
            ep.waiters += 1;
            (modem::wake_counts(ep), ep.hangups)
        };
        debug!("slot {}: {} waiting for {:?}", self.index, side, mask);

        let outcome = loop {
            if cancel.is_cancelled() {
                break Err(BridgeError::Interrupted);
            }
            let Some(ep) = state.endpoint(side) else {
                break Err(BridgeError::PortClosed);
            };
            if ep.hangups != hangups {
                break Err(BridgeError::PortClosed);
            }

            let now = modem::wake_counts(ep);
            match classify_wake(&prev, &now, mask) {
                WakeVerdict::Sleep => self.changed(side).wait(&mut state),
                WakeVerdict::NoChange => break Err(BridgeError::NoChange),
                WakeVerdict::Matched => break Ok(()),
                WakeVerdict::Rearm => prev = now,
            }
        };

        if let Some(ep) = state.endpoint_mut(side) {
            ep.waiters -= 1;
        }
        outcome
    }

    /// Release every outstanding open reference. Returns how many were released.
    pub(crate) fn shutdown(&self) -> usize {
        let mut state = self.lock();
        let mut released = 0;
        for side in [Side::Device, Side::Commander] {
            while let Some(remaining) = self.release_locked(&mut state, side) {
                released += 1;
                if remaining == 0 {
                    break;
                }
            }
        }
        released
    }

    pub fn status(&self) -> SlotStatus {
        let state = self.lock();
        let report = |ep: &Endpoint| EndpointStatus {
            open_count: ep.open_count,
            attached: ep.is_attached(),
            history_len: ep.history.len(),
            history_capacity: ep.history.capacity(),
            modem_bits: modem::get_modem_bits(ep).bits(),
            waiters: ep.waiters,
        };
        SlotStatus {
            index: self.index,
            device: state.device.as_ref().map(report),
            commander: state.commander.as_ref().map(report),
        }
    }
}

impl std::fmt::Debug for PortSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortSlot").field("index", &self.index).finish()
    }
}
