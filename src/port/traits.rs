//! Core traits and line settings at the bridge/collaborator boundary.
//!
//! The bridge never owns the queue a reader actually drains. It pushes bytes
//! into a `ReaderHandle` supplied by the integration layer and asks that layer
//! for a fresh handle each time an endpoint is opened.

use crate::bridge::Side;
use serde::{Deserialize, Serialize};

/// Line settings of one endpoint (the termios subset the emulator reports on).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// Baud rate (bits per second). Never enforced; reported only.
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// RTS/CTS hardware flow control.
    pub hardware_flow: bool,

    /// XON/XOFF software flow control.
    pub software_flow: SoftwareFlow,

    /// Break and parity handling input flags.
    pub input: InputFlags,

    /// Receiver enabled (CREAD).
    pub receiver_enabled: bool,

    /// Drop modem lines on last close (HUPCL).
    pub hangup_on_close: bool,

    /// Ignore modem status lines (CLOCAL).
    pub local_mode: bool,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            hardware_flow: false,
            software_flow: SoftwareFlow::default(),
            input: InputFlags::default(),
            receiver_enabled: true,
            hangup_on_close: true,
            local_mode: true,
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl DataBits {
    pub fn bits(self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl std::fmt::Display for Parity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parity::None => write!(f, "none"),
            Parity::Odd => write!(f, "odd"),
            Parity::Even => write!(f, "even"),
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    One,
    Two,
}

impl StopBits {
    pub fn bits(self) -> u8 {
        match self {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

/// XON/XOFF settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftwareFlow {
    /// Inbound XON/XOFF (IXOFF).
    pub inbound: bool,
    /// Outbound XON/XOFF (IXON).
    pub outbound: bool,
    /// Start character (XON).
    pub start_char: u8,
    /// Stop character (XOFF).
    pub stop_char: u8,
}

impl Default for SoftwareFlow {
    fn default() -> Self {
        Self {
            inbound: false,
            outbound: false,
            start_char: 0x11,
            stop_char: 0x13,
        }
    }
}

/// Input flags that affect how breaks and parity errors are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputFlags {
    pub ignore_break: bool,
    pub break_interrupts: bool,
    pub ignore_parity_errors: bool,
    pub mark_parity_errors: bool,
    pub parity_check: bool,
}

/// Sink for bytes the bridge delivers to one endpoint's reader.
///
/// Delivered bytes are staged until `flush` makes them visible to whoever
/// reads the endpoint, so a forwarded write appears as one batch.
#[cfg_attr(test, mockall::automock)]
pub trait ReaderHandle: Send {
    /// Stage one byte for the reader.
    ///
    /// Returns `false` if the reader's queue is full and the byte was dropped.
    fn deliver(&mut self, byte: u8) -> bool;

    /// Make every staged byte visible to the reader.
    fn flush(&mut self);

    /// Space left in the reader's queue, in bytes.
    fn room(&self) -> usize;
}

/// Supplies a reader handle each time an endpoint starts an open lifecycle.
pub trait ReaderFactory: Send + Sync {
    fn attach(&self, slot: usize, side: Side) -> Box<dyn ReaderHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_line_config() {
        let config = LineConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert!(!config.hardware_flow);
        assert!(config.receiver_enabled);
        assert!(config.hangup_on_close);
        assert!(config.local_mode);
    }

    #[test]
    fn test_bit_widths() {
        assert_eq!(DataBits::Five.bits(), 5);
        assert_eq!(DataBits::Seven.bits(), 7);
        assert_eq!(StopBits::Two.bits(), 2);
    }

    #[test]
    fn test_xon_xoff_defaults() {
        let flow = SoftwareFlow::default();
        assert_eq!(flow.start_char, 0x11);
        assert_eq!(flow.stop_char, 0x13);
    }

    #[test]
    fn test_line_config_partial_json() {
        let config: LineConfig =
            serde_json::from_str(r#"{"baud_rate": 115200, "parity": "even"}"#).unwrap();
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.data_bits, DataBits::Eight);
    }
}
