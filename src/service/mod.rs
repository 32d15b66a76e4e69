//! Service layer over the slot pool.
//!
//! Turns client-facing ids and names into bridge calls and bridge results
//! into serializable DTOs, so front ends only deal with their own protocol.
//!
//! # Architecture
//!
//! ```text
//! stdio ──> BridgeService ──> BridgeState ──> PortSlotPool
//!                                  └────────> QueueRegistry (reader side)
//! ```

use crate::bridge::{
    CancelToken, Forwarded, LineConfigChange, LineCounters, LineDiagnostics, LineEvent,
    ModemLines, SerialInfo, Side, SlotStatus,
};
use crate::error::{AppError, AppResult};
use crate::port::LineConfig;
use crate::state::AppState;
use serde::Serialize;
use tracing::debug;

/// Read size when the client does not ask for one.
pub const DEFAULT_READ_MAX: usize = 1024;

// ========== Request/Response DTOs ==========

/// Result from opening an endpoint
#[derive(Debug, Clone, Serialize)]
pub struct OpenResult {
    pub handle: u64,
    pub slot: usize,
    pub side: Side,
    pub node: String,
}

/// Result from closing an endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CloseResult {
    pub handle: u64,
    /// Open references left on the endpoint after this close
    pub open_count: u32,
}

/// How the bridge handled a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Delivered,
    LineEnding,
    EchoSuppressed,
}

/// Result from writing data
#[derive(Debug, Clone, Serialize)]
pub struct WriteResult {
    pub accepted: usize,
    pub outcome: WriteOutcome,
    /// Bytes the peer's queue had no room for
    pub dropped: usize,
}

impl From<Forwarded> for WriteResult {
    fn from(forwarded: Forwarded) -> Self {
        let (outcome, dropped) = match forwarded {
            Forwarded::LineEnding(_) => (WriteOutcome::LineEnding, 0),
            Forwarded::EchoSuppressed => (WriteOutcome::EchoSuppressed, 0),
            Forwarded::Delivered { dropped, .. } => (WriteOutcome::Delivered, dropped),
        };
        Self {
            accepted: forwarded.accepted(),
            outcome,
            dropped,
        }
    }
}

/// Result from reading delivered bytes
#[derive(Debug, Clone, Serialize)]
pub struct ReadResult {
    /// Lossy UTF-8 view of the bytes
    pub data: String,
    pub hex: String,
    pub bytes_read: usize,
    /// Bytes still queued after this read
    pub remaining: usize,
}

/// Modem line word and the names of the set lines
#[derive(Debug, Clone, Serialize)]
pub struct ModemResult {
    pub bits: u32,
    pub lines: Vec<&'static str>,
}

impl From<ModemLines> for ModemResult {
    fn from(lines: ModemLines) -> Self {
        Self {
            bits: lines.bits(),
            lines: lines.names(),
        }
    }
}

/// Result of a line settings change
#[derive(Debug, Clone, Serialize)]
pub struct LineChangeResult {
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<LineDiagnostics>,
}

/// One registered handle
#[derive(Debug, Clone, Serialize)]
pub struct HandleInfo {
    pub handle: u64,
    pub slot: usize,
    pub side: Side,
    pub node: String,
}

/// Whole-bridge status report
#[derive(Debug, Clone, Serialize)]
pub struct StatusResult {
    pub slots: Vec<SlotStatus>,
    pub handles: Vec<HandleInfo>,
    pub pending_waits: usize,
}

// ========== Helpers ==========

/// Upper-case hex, bytes separated by spaces.
pub fn encode_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse hex bytes, ignoring whitespace between them.
pub fn decode_hex(text: &str) -> AppResult<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(AppError::InvalidPayload(format!("invalid hex digit '{}'", bad)));
    }
    if digits.len() % 2 != 0 {
        return Err(AppError::InvalidPayload(
            "hex data must have an even number of digits".into(),
        ));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| {
                AppError::InvalidPayload(format!("invalid hex byte '{}'", &digits[i..i + 2]))
            })
        })
        .collect()
}

/// Parse a list of line names such as `["dtr", "rts"]` into a line set.
pub fn parse_lines<S: AsRef<str>>(names: &[S]) -> AppResult<ModemLines> {
    names.iter().try_fold(ModemLines::empty(), |acc, name| {
        ModemLines::parse_name(name.as_ref())
            .map(|line| acc | line)
            .ok_or_else(|| {
                AppError::InvalidPayload(format!("unknown modem line '{}'", name.as_ref()))
            })
    })
}

// ========== Service Implementation ==========

/// Bridge service used by the front ends.
#[derive(Clone)]
pub struct BridgeService {
    state: AppState,
}

impl BridgeService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Open `side` of `slot` and register a client handle for it.
    ///
    /// # Errors
    ///
    /// - `BridgeError::InvalidIndex` if the slot does not exist
    pub fn open(&self, slot: usize, side: Side) -> AppResult<OpenResult> {
        let handle = self.state.pool().acquire(slot, side)?;
        let id = self.state.register(handle);
        Ok(OpenResult {
            handle: id,
            slot,
            side,
            node: self.state.readers().node_name(slot, side),
        })
    }

    /// Close a client handle. The handle id is invalid afterwards.
    pub fn close(&self, id: u64) -> AppResult<CloseResult> {
        let handle = self.state.unregister(id)?;
        let open_count = self.state.pool().release(handle);
        Ok(CloseResult {
            handle: id,
            open_count,
        })
    }

    pub fn write(&self, id: u64, bytes: &[u8]) -> AppResult<WriteResult> {
        let handle = self.state.lookup(id)?;
        let forwarded = self.state.pool().forward(handle, bytes)?;
        Ok(forwarded.into())
    }

    /// Take up to `max` delivered bytes from the handle's own reader queue.
    pub fn read(&self, id: u64, max: Option<usize>) -> AppResult<ReadResult> {
        let handle = self.state.lookup(id)?;
        let Some(queue) = self.state.readers().reader(handle.slot(), handle.side()) else {
            return Ok(ReadResult {
                data: String::new(),
                hex: String::new(),
                bytes_read: 0,
                remaining: 0,
            });
        };
        let bytes = queue.read_available(max.unwrap_or(DEFAULT_READ_MAX));
        debug!("{}: read {} bytes", handle, bytes.len());
        Ok(ReadResult {
            data: String::from_utf8_lossy(&bytes).into_owned(),
            hex: encode_hex(&bytes),
            bytes_read: bytes.len(),
            remaining: queue.available(),
        })
    }

    pub fn room(&self, id: u64) -> AppResult<usize> {
        let handle = self.state.lookup(id)?;
        Ok(self.state.pool().room(handle)?)
    }

    pub fn get_modem(&self, id: u64) -> AppResult<ModemResult> {
        let handle = self.state.lookup(id)?;
        Ok(self.state.pool().get_modem_bits(handle)?.into())
    }

    pub fn set_modem<S: AsRef<str>>(&self, id: u64, set: &[S], clear: &[S]) -> AppResult<ModemResult> {
        let handle = self.state.lookup(id)?;
        let (set, clear) = (parse_lines(set)?, parse_lines(clear)?);
        Ok(self.state.pool().set_modem_bits(handle, set, clear)?.into())
    }

    /// Block until a line in `mask` changes. Tracks `wait_id` for [`cancel`](Self::cancel).
    ///
    /// An empty mask watches every status line.
    pub fn wait<S: AsRef<str>>(&self, id: u64, mask: &[S], wait_id: &str) -> AppResult<()> {
        let handle = self.state.lookup(id)?;
        let mut mask = parse_lines(mask)?;
        if mask.is_empty() {
            mask = ModemLines::status_lines();
        }
        let token: CancelToken = self.state.begin_wait(wait_id)?;
        let result = self.state.pool().wait_for_change(handle, mask, &token);
        self.state.end_wait(wait_id);
        Ok(result?)
    }

    pub fn cancel(&self, wait_id: &str) -> AppResult<()> {
        self.state.cancel_wait(wait_id)
    }

    pub fn counts(&self, id: u64) -> AppResult<LineCounters> {
        let handle = self.state.lookup(id)?;
        Ok(self.state.pool().snapshot_counts(handle)?)
    }

    pub fn serial_info(&self, id: u64) -> AppResult<SerialInfo> {
        let handle = self.state.lookup(id)?;
        Ok(self.state.pool().describe_fake_serial(handle)?)
    }

    pub fn get_line(&self, id: u64) -> AppResult<LineConfig> {
        let handle = self.state.lookup(id)?;
        Ok(self.state.pool().get_line_config(handle)?)
    }

    pub fn set_line(&self, id: u64, config: LineConfig) -> AppResult<LineChangeResult> {
        let handle = self.state.lookup(id)?;
        let result = match self.state.pool().set_line_config(handle, config)? {
            LineConfigChange::Unchanged => LineChangeResult {
                changed: false,
                diagnostics: None,
            },
            LineConfigChange::Changed(diag) => LineChangeResult {
                changed: true,
                diagnostics: Some(diag),
            },
        };
        Ok(result)
    }

    pub fn inject(&self, id: u64, event: LineEvent) -> AppResult<LineCounters> {
        let handle = self.state.lookup(id)?;
        Ok(self.state.pool().inject_line_event(handle, event)?)
    }

    pub fn discard_history(&self, id: u64) -> AppResult<usize> {
        let handle = self.state.lookup(id)?;
        Ok(self.state.pool().discard_history(handle)?)
    }

    pub fn status(&self) -> AppResult<StatusResult> {
        let pool = self.state.pool();
        let slots = (0..pool.slot_count())
            .map(|index| pool.slot_status(index))
            .collect::<Result<Vec<_>, _>>()?;
        let handles = self
            .state
            .open_handles()
            .into_iter()
            .map(|(id, handle)| HandleInfo {
                handle: id,
                slot: handle.slot(),
                side: handle.side(),
                node: self.state.readers().node_name(handle.slot(), handle.side()),
            })
            .collect();
        Ok(StatusResult {
            slots,
            handles,
            pending_waits: self.state.pending_waits(),
        })
    }

    pub fn listing(&self) -> String {
        self.state.pool().listing()
    }

    pub fn shutdown(&self) -> usize {
        self.state.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeError;
    use crate::config::Config;
    use crate::state::BridgeState;
    use pretty_assertions::assert_eq;

    fn service() -> BridgeService {
        BridgeService::new(BridgeState::shared(&Config::default()))
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(encode_hex(b"\x01\xab"), "01 AB");
        assert_eq!(decode_hex("01 ab\n0D").unwrap(), vec![0x01, 0xAB, 0x0D]);
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("zz").is_err());
    }

    #[test]
    fn test_parse_lines() {
        assert_eq!(
            parse_lines(&["dtr", "RTS"]).unwrap(),
            ModemLines::DTR | ModemLines::RTS
        );
        assert!(parse_lines::<&str>(&[]).unwrap().is_empty());
        assert!(parse_lines(&["volume"]).is_err());
    }

    #[test]
    fn test_open_write_read() {
        let svc = service();
        let dev = svc.open(0, Side::Device).unwrap();
        let cmd = svc.open(0, Side::Commander).unwrap();
        assert_eq!(dev.node, "ttyVirtualDevice0");
        assert_eq!(cmd.node, "ttyVirtualCommander0");

        let written = svc.write(cmd.handle, b"go\n").unwrap();
        assert_eq!(written.accepted, 3);
        assert_eq!(written.outcome, WriteOutcome::Delivered);

        let read = svc.read(dev.handle, None).unwrap();
        assert_eq!(read.data, "go\n");
        assert_eq!(read.hex, "67 6F 0A");
        assert_eq!(read.remaining, 0);

        let echoed = svc.write(dev.handle, b"g").unwrap();
        assert_eq!(echoed.outcome, WriteOutcome::EchoSuppressed);
        assert_eq!(svc.read(cmd.handle, None).unwrap().bytes_read, 0);
    }

    #[test]
    fn test_closed_handle_is_unknown() {
        let svc = service();
        let dev = svc.open(1, Side::Device).unwrap();
        assert_eq!(svc.close(dev.handle).unwrap().open_count, 0);
        assert!(matches!(svc.room(dev.handle), Err(AppError::UnknownHandle(_))));
        assert!(matches!(svc.close(dev.handle), Err(AppError::UnknownHandle(_))));
    }

    #[test]
    fn test_write_without_peer() {
        let svc = service();
        let dev = svc.open(3, Side::Device).unwrap();
        let err = svc.write(dev.handle, b"hello").unwrap_err();
        assert!(matches!(
            err,
            AppError::Bridge(BridgeError::PeerNotAttached { slot: 3, .. })
        ));
    }

    #[test]
    fn test_cancelled_wait_reports_interrupted() {
        let svc = service();
        let dev = svc.open(0, Side::Device).unwrap();

        let waiter = {
            let svc = svc.clone();
            std::thread::spawn(move || svc.wait(dev.handle, &["cts"], "w"))
        };
        while svc.state().pending_waits() == 0 {
            std::thread::yield_now();
        }
        svc.cancel("w").unwrap();

        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(AppError::Bridge(BridgeError::Interrupted))));
        assert_eq!(svc.state().pending_waits(), 0);
    }

    #[test]
    fn test_status_lists_handles() {
        let svc = service();
        svc.open(2, Side::Commander).unwrap();
        let status = svc.status().unwrap();
        assert_eq!(status.slots.len(), 4);
        assert_eq!(status.handles.len(), 1);
        assert_eq!(status.handles[0].node, "ttyVirtualCommander2");
        assert!(status.slots[2].commander.is_some());
    }
}
