//! Line settings change monitor.
//!
//! Purely diagnostic: nothing here affects forwarding.

use crate::port::{LineConfig, Parity};
use serde::Serialize;
use std::fmt;

/// XON/XOFF state as reported when either direction is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XonXoff {
    pub inbound: bool,
    pub outbound: bool,
    pub start_char: u8,
    pub stop_char: u8,
}

/// Decoded description of a line configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineDiagnostics {
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub rts_cts: bool,
    pub xon_xoff: Option<XonXoff>,
    pub baud_rate: u32,
    /// Names of the fields that differ from the previous configuration.
    pub changed: Vec<&'static str>,
}

/// Outcome of [`apply_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineConfigChange {
    Unchanged,
    Changed(LineDiagnostics),
}

fn changed_fields(new: &LineConfig, old: Option<&LineConfig>) -> Vec<&'static str> {
    let Some(old) = old else {
        return vec!["all"];
    };

    let mut fields = Vec::new();
    if new.data_bits != old.data_bits {
        fields.push("data_bits");
    }
    if new.parity != old.parity {
        fields.push("parity");
    }
    if new.stop_bits != old.stop_bits {
        fields.push("stop_bits");
    }
    if new.hardware_flow != old.hardware_flow {
        fields.push("hardware_flow");
    }
    if new.software_flow != old.software_flow {
        fields.push("software_flow");
    }
    if new.input != old.input {
        fields.push("input");
    }
    if new.baud_rate != old.baud_rate {
        fields.push("baud_rate");
    }
    if new.receiver_enabled != old.receiver_enabled
        || new.hangup_on_close != old.hangup_on_close
        || new.local_mode != old.local_mode
    {
        fields.push("control");
    }
    fields
}

/// Compare `new` with `old` and describe `new` if anything relevant differs.
///
/// Without a previous configuration the change is always reported.
pub fn apply_config(new: &LineConfig, old: Option<&LineConfig>) -> LineConfigChange {
    let changed = changed_fields(new, old);
    if changed.is_empty() {
        return LineConfigChange::Unchanged;
    }

    let flow = new.software_flow;
    let xon_xoff = (flow.inbound || flow.outbound).then_some(XonXoff {
        inbound: flow.inbound,
        outbound: flow.outbound,
        start_char: flow.start_char,
        stop_char: flow.stop_char,
    });

    LineConfigChange::Changed(LineDiagnostics {
        data_bits: new.data_bits.bits(),
        parity: new.parity,
        stop_bits: new.stop_bits.bits(),
        rts_cts: new.hardware_flow,
        xon_xoff,
        baud_rate: new.baud_rate,
        changed,
    })
}

fn enabled(on: bool) -> &'static str {
    if on {
        "enabled"
    } else {
        "disabled"
    }
}

impl fmt::Display for LineDiagnostics {
    /// One ` - field = value` line per setting.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " - data bits = {}", self.data_bits)?;
        writeln!(f, " - parity = {}", self.parity)?;
        writeln!(f, " - stop bits = {}", self.stop_bits)?;
        writeln!(f, " - RTS/CTS is {}", enabled(self.rts_cts))?;
        if let Some(x) = &self.xon_xoff {
            for (direction, on) in [("INBOUND", x.inbound), ("OUTBOUND", x.outbound)] {
                if on {
                    writeln!(
                        f,
                        " - {} XON/XOFF is enabled, XON = {:02x}, XOFF = {:02x}",
                        direction, x.start_char, x.stop_char
                    )?;
                } else {
                    writeln!(f, " - {} XON/XOFF is disabled", direction)?;
                }
            }
        }
        write!(f, " - baud rate = {}", self.baud_rate)
    }
}
