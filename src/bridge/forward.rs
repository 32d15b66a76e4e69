//! Write path: deliver bytes from one endpoint to its peer's reader.
//!
//! Runs entirely under the slot lock, so checking history, delivering and
//! recording are one atomic step for writers on either side and for a
//! concurrent close.

use super::endpoint::{Endpoint, Side};
use super::error::{BridgeError, BridgeResult};
use super::slot::SlotState;
use tracing::{debug, trace, warn};

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// How a write was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarded {
    /// A bare line terminator passed straight through.
    LineEnding(usize),
    /// A lone byte matched the peer's own output and was dropped.
    EchoSuppressed,
    /// Normal delivery. `dropped` bytes did not fit in the peer's reader queue.
    Delivered { accepted: usize, dropped: usize },
}

impl Forwarded {
    /// Bytes reported as accepted to the writer.
    pub fn accepted(&self) -> usize {
        match self {
            Forwarded::LineEnding(n) => *n,
            Forwarded::EchoSuppressed => 1,
            Forwarded::Delivered { accepted, .. } => *accepted,
        }
    }
}

/// Exactly `\r\n` or exactly `\n`.
pub fn is_line_ending(bytes: &[u8]) -> bool {
    matches!(bytes, [CR, LF] | [LF])
}

/// Terminator bytes are delivered but never recorded as echo candidates.
fn is_terminator(byte: u8) -> bool {
    byte == CR || byte == LF
}

pub(crate) fn forward(
    state: &mut SlotState,
    slot: usize,
    side: Side,
    bytes: &[u8],
) -> BridgeResult<Forwarded> {
    let (source, dest) = state.split_mut(side);

    let dest = match dest {
        Some(dest) if dest.is_attached() => dest,
        _ => {
            debug!("slot {}: {} write rejected, {} not attached", slot, side, side.peer());
            return Err(BridgeError::PeerNotAttached {
                slot,
                side: side.peer(),
            });
        }
    };
    let source = match source {
        Some(source) if source.is_open() => source,
        _ => return Err(BridgeError::PortNotOpen { slot, side }),
    };

    trace!("slot {}: {} -> {}: {:02x?}", slot, side, side.peer(), bytes);

    if is_line_ending(bytes) {
        deliver_batch(slot, source, dest, bytes, false)?;
        return Ok(Forwarded::LineEnding(bytes.len()));
    }

    if let [byte] = bytes {
        if dest.history.try_consume(*byte) {
            debug!("slot {}: dropped echo {:#04x} from {}", slot, byte, side);
            return Ok(Forwarded::EchoSuppressed);
        }
    }

    let recordable = bytes.iter().filter(|b| !is_terminator(**b)).count();
    if recordable > source.history.free() {
        warn!(
            "slot {}: {} echo history overflow ({} pending, {} incoming)",
            slot,
            side,
            source.history.len(),
            recordable
        );
        return Err(BridgeError::ProtocolDesync {
            slot,
            side,
            capacity: source.history.capacity(),
        });
    }

    let dropped = deliver_batch(slot, source, dest, bytes, true)?;
    debug!(
        "slot {}: forwarded {} bytes {} -> {}",
        slot,
        bytes.len(),
        side,
        side.peer()
    );

    Ok(Forwarded::Delivered {
        accepted: bytes.len(),
        dropped,
    })
}

/// Deliver `bytes` to `dest` and flush once. Returns the number of dropped bytes.
fn deliver_batch(
    slot: usize,
    source: &mut Endpoint,
    dest: &mut Endpoint,
    bytes: &[u8],
    record: bool,
) -> BridgeResult<usize> {
    let Some(reader) = dest.reader.as_mut() else {
        return Ok(bytes.len());
    };

    let mut delivered = 0u64;
    let mut dropped = 0usize;
    for &byte in bytes {
        if !reader.deliver(byte) {
            dropped += 1;
            continue;
        }
        delivered += 1;
        if record && !is_terminator(byte) {
            source
                .history
                .record(byte)
                .map_err(|overflow| BridgeError::ProtocolDesync {
                    slot,
                    side: source.side,
                    capacity: overflow.capacity,
                })?;
        }
    }
    reader.flush();

    source.icount.tx += delivered;
    dest.icount.rx += delivered;
    dest.icount.buf_overrun += dropped as u64;

    Ok(dropped)
}
