//! Cancellation for status waits.

use super::endpoint::Side;
use super::slot::PortSlot;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    parked: Mutex<Vec<(Arc<PortSlot>, Side)>>,
}

/// Signal-style cancellation for [`wait_for_change`](super::PortSlotPool::wait_for_change).
///
/// Clones share state. Cancelling wakes every wait currently parked on the
/// token; a wait started on an already-cancelled token returns at once.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);

        let parked = self.inner.parked.lock().clone();
        for (slot, side) in parked {
            // Taking the slot lock orders this wake after the waiter's flag check.
            slot.notify_locked(side);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Register a parked wait until the returned guard drops.
    pub(crate) fn park(&self, slot: &Arc<PortSlot>, side: Side) -> Parked {
        self.inner.parked.lock().push((Arc::clone(slot), side));
        Parked {
            inner: Arc::clone(&self.inner),
            slot: Arc::clone(slot),
            side,
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

pub(crate) struct Parked {
    inner: Arc<CancelInner>,
    slot: Arc<PortSlot>,
    side: Side,
}

impl Drop for Parked {
    fn drop(&mut self) {
        let mut parked = self.inner.parked.lock();
        if let Some(pos) = parked
            .iter()
            .position(|(slot, side)| Arc::ptr_eq(slot, &self.slot) && *side == self.side)
        {
            parked.swap_remove(pos);
        }
    }
}
