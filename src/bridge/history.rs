//! Echo history ring buffer.
//!
//! Records the bytes an endpoint forwarded to its peer so that the same byte
//! coming straight back (the peer's terminal echoing it) can be recognized
//! and dropped instead of being looped back to the sender.

use thiserror::Error;

/// Default history capacity per endpoint, in bytes.
pub const DEFAULT_HISTORY_CAPACITY: usize = 512;

/// The history is full; the driving application stopped reconciling echoes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("echo history full ({capacity} unreconciled bytes)")]
pub struct HistoryOverflow {
    pub capacity: usize,
}

/// Fixed-capacity FIFO of forwarded bytes.
///
/// `tail` is the oldest unconsumed entry and `len` the number of entries, so
/// the write position is `(tail + len) % capacity`. A full buffer is never
/// overwritten.
#[derive(Debug, Clone)]
pub struct EchoHistory {
    buf: Box<[u8]>,
    tail: usize,
    len: usize,
}

impl EchoHistory {
    /// Create an empty history. A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
            tail: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Entries that can still be recorded before overflow.
    pub fn free(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Append `byte` at the head.
    pub fn record(&mut self, byte: u8) -> Result<(), HistoryOverflow> {
        if self.is_full() {
            return Err(HistoryOverflow {
                capacity: self.capacity(),
            });
        }
        let head = (self.tail + self.len) % self.buf.len();
        self.buf[head] = byte;
        self.len += 1;
        Ok(())
    }

    /// Consume the oldest entry if it equals `byte`.
    ///
    /// Leaves the buffer untouched and returns `false` otherwise.
    pub fn try_consume(&mut self, byte: u8) -> bool {
        match self.oldest() {
            Some(oldest) if oldest == byte => {
                self.tail = (self.tail + 1) % self.buf.len();
                self.len -= 1;
                true
            }
            _ => false,
        }
    }

    /// The oldest unconsumed entry.
    pub fn oldest(&self) -> Option<u8> {
        (self.len > 0).then(|| self.buf[self.tail])
    }

    /// Unconsumed entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.len).map(move |i| self.buf[(self.tail + i) % self.buf.len()])
    }

    /// Drop every entry, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.len;
        self.tail = 0;
        self.len = 0;
        dropped
    }
}

impl Default for EchoHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
