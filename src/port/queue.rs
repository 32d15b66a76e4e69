//! In-memory reader queues for bridge endpoints.
//!
//! Provides a `QueueReader` that plays the role of a tty flip buffer: bytes
//! are staged by `deliver`, become readable after `flush`, and are drained by
//! whoever reads the endpoint. `QueueRegistry` hands out one persistent queue
//! per `(slot, side)` so bytes survive a close/reopen cycle.

use super::traits::{ReaderFactory, ReaderHandle};
use crate::bridge::Side;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Default capacity of a reader queue, in bytes.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Inner state of a queue, protected by a mutex for interior mutability.
#[derive(Debug, Default)]
struct QueueState {
    /// Bytes delivered but not yet flushed.
    staged: Vec<u8>,
    /// Bytes visible to the reader.
    visible: VecDeque<u8>,
    /// Total bytes the queue may hold (staged + visible).
    capacity: usize,
    /// Number of flushes performed.
    flushes: u64,
    /// Number of bytes dropped because the queue was full.
    dropped: u64,
}

/// Reader queue for one endpoint.
///
/// Clones share the same queue, so the bridge can hold one clone while the
/// integration layer drains another.
///
/// # Example
/// ```
/// use virtual_serial_bridge::port::{QueueReader, ReaderHandle};
///
/// let queue = QueueReader::new("ttyVirtualDevice0", 16);
/// let mut bridge_side = queue.clone();
///
/// bridge_side.deliver(b'o');
/// bridge_side.deliver(b'k');
/// assert_eq!(queue.available(), 0);
///
/// bridge_side.flush();
/// assert_eq!(queue.drain(), b"ok");
/// ```
#[derive(Clone)]
pub struct QueueReader {
    name: String,
    state: Arc<Mutex<QueueState>>,
}

impl QueueReader {
    /// Create an empty queue with the given name and capacity.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(QueueState {
                capacity,
                ..Default::default()
            })),
        }
    }

    /// Node-style name of the endpoint this queue feeds.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take up to `max` visible bytes, oldest first.
    pub fn read_available(&self, max: usize) -> Vec<u8> {
        let mut state = self.state.lock();
        let n = max.min(state.visible.len());
        state.visible.drain(..n).collect()
    }

    /// Take every visible byte.
    pub fn drain(&self) -> Vec<u8> {
        let mut state = self.state.lock();
        state.visible.drain(..).collect()
    }

    /// Number of visible bytes.
    pub fn available(&self) -> usize {
        self.state.lock().visible.len()
    }

    /// Number of delivered bytes still waiting for a flush.
    pub fn staged(&self) -> usize {
        self.state.lock().staged.len()
    }

    /// Number of flushes performed so far.
    pub fn flush_count(&self) -> u64 {
        self.state.lock().flushes
    }

    /// Number of bytes dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }
}

impl ReaderHandle for QueueReader {
    fn deliver(&mut self, byte: u8) -> bool {
        let mut state = self.state.lock();
        if state.staged.len() + state.visible.len() >= state.capacity {
            state.dropped += 1;
            return false;
        }
        state.staged.push(byte);
        true
    }

    fn flush(&mut self) {
        let mut state = self.state.lock();
        let staged = std::mem::take(&mut state.staged);
        state.visible.extend(staged);
        state.flushes += 1;
    }

    fn room(&self) -> usize {
        let state = self.state.lock();
        state
            .capacity
            .saturating_sub(state.staged.len() + state.visible.len())
    }
}

impl std::fmt::Debug for QueueReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueReader")
            .field("name", &self.name)
            .field("available", &self.available())
            .finish()
    }
}

/// Reader factory backed by one persistent `QueueReader` per `(slot, side)`.
#[derive(Debug)]
pub struct QueueRegistry {
    capacity: usize,
    device_prefix: String,
    commander_prefix: String,
    queues: Mutex<HashMap<(usize, Side), QueueReader>>,
}

impl QueueRegistry {
    pub fn new(capacity: usize) -> Self {
        Self::with_prefixes(capacity, "ttyVirtualDevice", "ttyVirtualCommander")
    }

    /// Create a registry whose queues are named `<prefix><slot>`.
    pub fn with_prefixes(
        capacity: usize,
        device_prefix: impl Into<String>,
        commander_prefix: impl Into<String>,
    ) -> Self {
        Self {
            capacity,
            device_prefix: device_prefix.into(),
            commander_prefix: commander_prefix.into(),
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// The queue for `(slot, side)`, if that endpoint has ever been attached.
    pub fn reader(&self, slot: usize, side: Side) -> Option<QueueReader> {
        self.queues.lock().get(&(slot, side)).cloned()
    }

    /// Node-style name for `(slot, side)`.
    pub fn node_name(&self, slot: usize, side: Side) -> String {
        match side {
            Side::Device => format!("{}{}", self.device_prefix, slot),
            Side::Commander => format!("{}{}", self.commander_prefix, slot),
        }
    }

    fn queue(&self, slot: usize, side: Side) -> QueueReader {
        let name = self.node_name(slot, side);
        self.queues
            .lock()
            .entry((slot, side))
            .or_insert_with(|| QueueReader::new(name, self.capacity))
            .clone()
    }
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl ReaderFactory for QueueRegistry {
    fn attach(&self, slot: usize, side: Side) -> Box<dyn ReaderHandle> {
        Box::new(self.queue(slot, side))
    }
}
