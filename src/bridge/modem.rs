//! Modem control/status emulation.
//!
//! Shadow registers, the tiocmget/tiocmset bit mapping, event counters and
//! the fixed serial descriptor. The blocking status wait lives on
//! [`PortSlot`](super::slot::PortSlot) because it needs the slot's lock and
//! condition variables; the decision of what a wake means is made here.

use super::endpoint::Endpoint;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::time::Duration;

bitflags! {
    /// Modem control register shadow.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Mcr: u8 {
        const DTR = 0x01;
        const RTS = 0x02;
        const LOOP = 0x04;
    }
}

bitflags! {
    /// Modem status register shadow.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Msr: u8 {
        const CTS = 0x08;
        const CD = 0x10;
        const RI = 0x20;
        const DSR = 0x40;
    }
}

bitflags! {
    /// Reported modem line word, using the Linux `TIOCM_*` bit values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModemLines: u32 {
        const DTR = 0x002;
        const RTS = 0x004;
        const CTS = 0x020;
        const CAR = 0x040;
        const RNG = 0x080;
        const DSR = 0x100;
        const LOOP = 0x8000;
    }
}

impl ModemLines {
    /// Lines a status wait can watch.
    pub fn status_lines() -> Self {
        Self::RNG | Self::DSR | Self::CAR | Self::CTS
    }

    /// Parse a line name such as `"dtr"` or `"cd"`.
    pub fn parse_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "dtr" => Some(Self::DTR),
            "rts" => Some(Self::RTS),
            "cts" => Some(Self::CTS),
            "car" | "cd" | "dcd" => Some(Self::CAR),
            "rng" | "ri" => Some(Self::RNG),
            "dsr" => Some(Self::DSR),
            "loop" => Some(Self::LOOP),
            _ => None,
        }
    }

    /// Lower-case names of the set lines.
    pub fn names(&self) -> Vec<&'static str> {
        [
            (Self::DTR, "dtr"),
            (Self::RTS, "rts"),
            (Self::CTS, "cts"),
            (Self::CAR, "cd"),
            (Self::RNG, "ri"),
            (Self::DSR, "dsr"),
            (Self::LOOP, "loop"),
        ]
        .into_iter()
        .filter(|(line, _)| self.contains(*line))
        .map(|(_, name)| name)
        .collect()
    }
}

/// Cumulative line-status event counters of one endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCounters {
    pub rx: u64,
    pub tx: u64,
    pub cts: u64,
    pub dsr: u64,
    pub rng: u64,
    pub dcd: u64,
    pub frame: u64,
    pub overrun: u64,
    pub parity: u64,
    pub brk: u64,
    pub buf_overrun: u64,
}

impl LineCounters {
    fn modem_changed(&self, prev: &Self) -> bool {
        self.cts != prev.cts || self.dsr != prev.dsr || self.rng != prev.rng || self.dcd != prev.dcd
    }

    /// Any change a status waiter should wake up for. Traffic counters are excluded.
    fn status_changed(&self, prev: &Self) -> bool {
        self.modem_changed(prev)
            || self.frame != prev.frame
            || self.overrun != prev.overrun
            || self.parity != prev.parity
            || self.brk != prev.brk
            || self.buf_overrun != prev.buf_overrun
    }

    fn matches(&self, prev: &Self, mask: ModemLines) -> bool {
        (mask.contains(ModemLines::RNG) && self.rng != prev.rng)
            || (mask.contains(ModemLines::DSR) && self.dsr != prev.dsr)
            || (mask.contains(ModemLines::CAR) && self.dcd != prev.dcd)
            || (mask.contains(ModemLines::CTS) && self.cts != prev.cts)
    }
}

/// What a status waiter should do after re-reading the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WakeVerdict {
    /// Nothing a waiter cares about changed; keep sleeping.
    Sleep,
    /// Woken, but none of the modem lines changed.
    NoChange,
    /// A line in the mask changed.
    Matched,
    /// Only lines outside the mask changed; take a new snapshot and wait again.
    Rearm,
}

pub(crate) fn classify_wake(prev: &LineCounters, now: &LineCounters, mask: ModemLines) -> WakeVerdict {
    if !now.status_changed(prev) {
        WakeVerdict::Sleep
    } else if !now.modem_changed(prev) {
        WakeVerdict::NoChange
    } else if now.matches(prev, mask) {
        WakeVerdict::Matched
    } else {
        WakeVerdict::Rearm
    }
}

/// Line-status events injected by the integration layer.
///
/// Level events only count on an actual transition; error events always count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "level", rename_all = "snake_case")]
pub enum LineEvent {
    Cts(bool),
    Dsr(bool),
    CarrierDetect(bool),
    Ring(bool),
    FrameError,
    Overrun,
    ParityError,
    Break,
    BufferOverrun,
}

/// Stored values reported by [`describe_fake_serial`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerialShadow {
    pub kind: i32,
    pub line: u32,
    pub port: u32,
    pub irq: i32,
    pub xmit_fifo_size: i32,
    pub baud_base: i32,
    pub custom_divisor: i32,
    pub hub6: i32,
    pub io_type: u8,
}

/// `ASYNC_SKIP_TEST | ASYNC_AUTO_IRQ`.
pub const FAKE_SERIAL_FLAGS: u32 = 0x40 | 0x80;
pub const CLOSE_DELAY: Duration = Duration::from_secs(5);
pub const CLOSING_WAIT: Duration = Duration::from_secs(30);

/// Fixed serial descriptor of an endpoint. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerialInfo {
    #[serde(rename = "type")]
    pub kind: i32,
    pub line: u32,
    pub port: u32,
    pub irq: i32,
    pub flags: u32,
    pub xmit_fifo_size: i32,
    pub baud_base: i32,
    pub close_delay_ms: u64,
    pub closing_wait_ms: u64,
    pub custom_divisor: i32,
    pub hub6: i32,
    pub io_type: u8,
}

/// OR the control lines from `mcr` with the status lines from `msr`.
pub fn get_modem_bits(endpoint: &Endpoint) -> ModemLines {
    let (mcr, msr) = (endpoint.mcr, endpoint.msr);
    let mut lines = ModemLines::empty();
    lines.set(ModemLines::DTR, mcr.contains(Mcr::DTR));
    lines.set(ModemLines::RTS, mcr.contains(Mcr::RTS));
    lines.set(ModemLines::LOOP, mcr.contains(Mcr::LOOP));
    lines.set(ModemLines::CTS, msr.contains(Msr::CTS));
    lines.set(ModemLines::CAR, msr.contains(Msr::CD));
    lines.set(ModemLines::RNG, msr.contains(Msr::RI));
    lines.set(ModemLines::DSR, msr.contains(Msr::DSR));
    lines
}

/// Apply RTS/DTR changes to `mcr`. Other bits in `set`/`clear` are ignored.
///
/// With `legacy_dtr_quirk` DTR requests drive the RTS bit, bit-for-bit with
/// the historical driver.
pub fn set_modem_bits(endpoint: &mut Endpoint, set: ModemLines, clear: ModemLines, legacy_dtr_quirk: bool) {
    let dtr = if legacy_dtr_quirk { Mcr::RTS } else { Mcr::DTR };
    let mut mcr = endpoint.mcr;

    if set.contains(ModemLines::RTS) {
        mcr.insert(Mcr::RTS);
    }
    if set.contains(ModemLines::DTR) {
        mcr.insert(dtr);
    }
    if clear.contains(ModemLines::RTS) {
        mcr.remove(Mcr::RTS);
    }
    if clear.contains(ModemLines::DTR) {
        mcr.remove(dtr);
    }

    endpoint.mcr = mcr;
}

/// Apply an injected event to `msr` and the counters.
///
/// Returns whether any counter changed.
pub fn apply_line_event(endpoint: &mut Endpoint, event: LineEvent) -> bool {
    let before = endpoint.icount;
    let counters = &mut endpoint.icount;
    let msr = &mut endpoint.msr;

    let mut level = |bit: Msr, on: bool, counter: &mut u64| {
        if msr.contains(bit) != on {
            msr.set(bit, on);
            *counter += 1;
        }
    };

    match event {
        LineEvent::Cts(on) => level(Msr::CTS, on, &mut counters.cts),
        LineEvent::Dsr(on) => level(Msr::DSR, on, &mut counters.dsr),
        LineEvent::CarrierDetect(on) => level(Msr::CD, on, &mut counters.dcd),
        LineEvent::Ring(on) => level(Msr::RI, on, &mut counters.rng),
        LineEvent::FrameError => counters.frame += 1,
        LineEvent::Overrun => counters.overrun += 1,
        LineEvent::ParityError => counters.parity += 1,
        LineEvent::Break => counters.brk += 1,
        LineEvent::BufferOverrun => {
            counters.buf_overrun += 1;
            endpoint.signalled_overruns += 1;
        }
    }

    endpoint.icount != before
}

/// Counters as seen by status waiters.
///
/// Reader-queue drops never notify, so only overruns raised by line events count.
pub(crate) fn wake_counts(endpoint: &Endpoint) -> LineCounters {
    LineCounters {
        buf_overrun: endpoint.signalled_overruns,
        ..endpoint.icount
    }
}

/// Read-only copy of every counter.
pub fn snapshot_counts(endpoint: &Endpoint) -> LineCounters {
    endpoint.icount
}

pub fn describe_fake_serial(endpoint: &Endpoint) -> SerialInfo {
    let shadow = &endpoint.serial;
    SerialInfo {
        kind: shadow.kind,
        line: shadow.line,
        port: shadow.port,
        irq: shadow.irq,
        flags: FAKE_SERIAL_FLAGS,
        xmit_fifo_size: shadow.xmit_fifo_size,
        baud_base: shadow.baud_base,
        close_delay_ms: CLOSE_DELAY.as_millis() as u64,
        closing_wait_ms: CLOSING_WAIT.as_millis() as u64,
        custom_divisor: shadow.custom_divisor,
        hub6: shadow.hub6,
        io_type: shadow.io_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::endpoint::Side;
    use crate::port::LineConfig;

    fn endpoint() -> Endpoint {
        Endpoint::new(0, Side::Device, 16, LineConfig::default())
    }

    #[test]
    fn test_get_modem_bits_combines_registers() {
        let mut ep = endpoint();
        ep.mcr = Mcr::DTR | Mcr::LOOP;
        ep.msr = Msr::CTS | Msr::RI;
        assert_eq!(
            get_modem_bits(&ep),
            ModemLines::DTR | ModemLines::LOOP | ModemLines::CTS | ModemLines::RNG
        );
    }

    #[test]
    fn test_set_modem_bits_independent_mapping() {
        let mut ep = endpoint();
        set_modem_bits(&mut ep, ModemLines::DTR, ModemLines::empty(), false);
        assert_eq!(ep.mcr, Mcr::DTR);

        set_modem_bits(&mut ep, ModemLines::RTS, ModemLines::DTR, false);
        assert_eq!(ep.mcr, Mcr::RTS);
    }

    #[test]
    fn test_set_modem_bits_legacy_quirk() {
        let mut ep = endpoint();
        set_modem_bits(&mut ep, ModemLines::DTR, ModemLines::empty(), true);
        assert_eq!(ep.mcr, Mcr::RTS);

        set_modem_bits(&mut ep, ModemLines::empty(), ModemLines::DTR, true);
        assert!(ep.mcr.is_empty());
    }

    #[test]
    fn test_wake_counts_ignore_queue_drops() {
        let mut ep = endpoint();
        let before = wake_counts(&ep);
        ep.icount.buf_overrun += 3;
        assert_eq!(wake_counts(&ep), before);
        assert_eq!(classify_wake(&before, &wake_counts(&ep), ModemLines::CTS), WakeVerdict::Sleep);

        assert!(apply_line_event(&mut ep, LineEvent::BufferOverrun));
        assert_eq!(ep.icount.buf_overrun, 4);
        assert_eq!(wake_counts(&ep).buf_overrun, 1);
        assert_eq!(
            classify_wake(&before, &wake_counts(&ep), ModemLines::CTS),
            WakeVerdict::NoChange
        );
    }

    #[test]
    fn test_set_modem_bits_ignores_status_lines() {
        let mut ep = endpoint();
        set_modem_bits(&mut ep, ModemLines::CTS | ModemLines::LOOP, ModemLines::empty(), false);
        assert!(ep.mcr.is_empty());
    }

    #[test]
    fn test_level_event_counts_transitions_only() {
        let mut ep = endpoint();
        assert!(apply_line_event(&mut ep, LineEvent::Cts(true)));
        assert!(!apply_line_event(&mut ep, LineEvent::Cts(true)));
        assert!(apply_line_event(&mut ep, LineEvent::Cts(false)));
        assert_eq!(ep.icount.cts, 2);
        assert!(!ep.msr.contains(Msr::CTS));
    }

    #[test]
    fn test_error_events_always_count() {
        let mut ep = endpoint();
        apply_line_event(&mut ep, LineEvent::Break);
        apply_line_event(&mut ep, LineEvent::Break);
        apply_line_event(&mut ep, LineEvent::FrameError);
        let counts = snapshot_counts(&ep);
        assert_eq!(counts.brk, 2);
        assert_eq!(counts.frame, 1);
        assert_eq!(counts.rx, 0);
    }

    #[test]
    fn test_classify_wake() {
        let prev = LineCounters::default();
        let mut now = prev;
        assert_eq!(classify_wake(&prev, &now, ModemLines::CTS), WakeVerdict::Sleep);

        now.rx = 10;
        assert_eq!(classify_wake(&prev, &now, ModemLines::CTS), WakeVerdict::Sleep);

        now.frame = 1;
        assert_eq!(classify_wake(&prev, &now, ModemLines::CTS), WakeVerdict::NoChange);

        now.dsr = 1;
        assert_eq!(classify_wake(&prev, &now, ModemLines::CTS), WakeVerdict::Rearm);
        assert_eq!(classify_wake(&prev, &now, ModemLines::DSR), WakeVerdict::Matched);
    }

    #[test]
    fn test_describe_fake_serial_constants() {
        let ep = Endpoint::new(3, Side::Commander, 16, LineConfig::default());
        let info = describe_fake_serial(&ep);
        assert_eq!(info.line, 3);
        assert_eq!(info.flags, 0xC0);
        assert_eq!(info.close_delay_ms, 5000);
        assert_eq!(info.closing_wait_ms, 30000);
    }

    #[test]
    fn test_line_names_roundtrip() {
        let lines = ModemLines::parse_name("cd").unwrap() | ModemLines::parse_name("RTS").unwrap();
        assert_eq!(lines.names(), vec!["rts", "cd"]);
        assert!(ModemLines::parse_name("bogus").is_none());
    }

    #[test]
    fn test_register_shadows_are_value_types() {
        let mut ep = Endpoint::new(0, Side::Device, 16, LineConfig::default());
        set_modem_bits(&mut ep, ModemLines::DTR, ModemLines::empty(), false);
        let before = ep.mcr;
        ep.mcr.insert(Mcr::RTS);
        assert_eq!(before, Mcr::DTR);
        assert_eq!(ep.mcr, Mcr::DTR | Mcr::RTS);
        assert_eq!(ep.msr, Msr::empty());

        let seen: std::collections::HashSet<ModemLines> =
            [ModemLines::CTS, ModemLines::CAR, ModemLines::CTS].into_iter().collect();
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_line_event_json() {
        let event: LineEvent = serde_json::from_str(r#"{"event":"cts","level":true}"#).unwrap();
        assert_eq!(event, LineEvent::Cts(true));
        let event: LineEvent = serde_json::from_str(r#"{"event":"break"}"#).unwrap();
        assert_eq!(event, LineEvent::Break);
    }
}
