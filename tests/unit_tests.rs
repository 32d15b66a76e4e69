//! Unit tests for the public value types of virtual-serial-bridge
//!
//! This module covers:
//! - `port`: LineConfig and its enums
//! - `bridge`: Side, ModemLines, LineEvent, line diagnostics
//! - `error`: AppError and BridgeError conversions and display
//!
//! Tests follow the Arrange-Act-Assert pattern and cover:
//! - Default values and initialization
//! - JSON mapping of the types the stdio interface exchanges
//! - Error display implementations and stable kind names

use virtual_serial_bridge::bridge::{
    apply_config, BridgeError, LineConfigChange, LineEvent, ModemLines, Side,
};
use virtual_serial_bridge::error::AppError;
use virtual_serial_bridge::port::{DataBits, LineConfig, Parity, StopBits};

// ============================================================================
// LineConfig Tests
// ============================================================================

#[cfg(test)]
mod line_config_tests {
    use super::*;

    #[test]
    fn test_line_config_defaults_from_empty_json() {
        // Arrange & Act: every field has a default
        let config: LineConfig = serde_json::from_str("{}").expect("Failed to deserialize");

        // Assert
        assert_eq!(config, LineConfig::default());
        assert_eq!(config.baud_rate, 9600, "Default baud rate should be 9600");
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.software_flow.start_char, 0x11);
        assert_eq!(config.software_flow.stop_char, 0x13);
    }

    #[test]
    fn test_line_config_partial_json() {
        // Arrange
        let json = r#"{
            "baud_rate": 115200,
            "data_bits": "seven",
            "parity": "odd",
            "stop_bits": "two",
            "software_flow": { "inbound": true }
        }"#;

        // Act
        let config: LineConfig = serde_json::from_str(json).expect("Failed to deserialize");

        // Assert
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.data_bits.bits(), 7);
        assert_eq!(config.parity, Parity::Odd);
        assert_eq!(config.stop_bits.bits(), 2);
        assert!(config.software_flow.inbound);
        assert!(!config.software_flow.outbound);
        assert_eq!(config.software_flow.stop_char, 0x13);
    }

    #[test]
    fn test_line_config_rejects_unknown_parity() {
        let result = serde_json::from_str::<LineConfig>(r#"{"parity": "mark"}"#);
        assert!(result.is_err(), "Unknown parity should be rejected");
    }

    #[test]
    fn test_diagnostics_report_every_setting() {
        // Arrange
        let old = LineConfig::default();
        let mut new = old.clone();
        new.hardware_flow = true;
        new.software_flow.outbound = true;

        // Act
        let change = apply_config(&new, Some(&old));

        // Assert
        let LineConfigChange::Changed(diag) = change else {
            panic!("expected a change");
        };
        assert_eq!(diag.changed, vec!["hardware_flow", "software_flow"]);
        let text = diag.to_string();
        assert!(text.contains(" - data bits = 8"));
        assert!(text.contains(" - RTS/CTS is enabled"));
        assert!(text.contains(" - baud rate = 9600"));
    }

    #[test]
    fn test_identical_config_is_unchanged() {
        let config = LineConfig::default();
        assert_eq!(apply_config(&config, Some(&config)), LineConfigChange::Unchanged);
    }
}

// ============================================================================
// Bridge value type Tests
// ============================================================================

#[cfg(test)]
mod bridge_type_tests {
    use super::*;

    #[test]
    fn test_side_parsing_and_display() {
        assert_eq!("device".parse::<Side>(), Ok(Side::Device));
        assert_eq!("CMD".parse::<Side>(), Ok(Side::Commander));
        assert!("host".parse::<Side>().is_err());
        assert_eq!(Side::Commander.to_string(), "commander");
        assert_eq!(Side::Device.peer(), Side::Commander);
    }

    #[test]
    fn test_side_json_mapping() {
        assert_eq!(serde_json::to_string(&Side::Device).unwrap(), "\"device\"");
        let side: Side = serde_json::from_str("\"commander\"").unwrap();
        assert_eq!(side, Side::Commander);
    }

    #[test]
    fn test_modem_line_names() {
        let lines = ModemLines::DTR | ModemLines::CAR | ModemLines::DSR;
        assert_eq!(lines.names(), vec!["dtr", "cd", "dsr"]);
        assert_eq!(ModemLines::parse_name("DCD"), Some(ModemLines::CAR));
        assert_eq!(ModemLines::parse_name("ri"), Some(ModemLines::RNG));
        assert_eq!(ModemLines::parse_name("xyz"), None);
    }

    #[test]
    fn test_modem_lines_use_tiocm_values() {
        assert_eq!(ModemLines::DTR.bits(), 0x002);
        assert_eq!(ModemLines::RTS.bits(), 0x004);
        assert_eq!(ModemLines::CTS.bits(), 0x020);
        assert_eq!(ModemLines::CAR.bits(), 0x040);
        assert_eq!(ModemLines::RNG.bits(), 0x080);
        assert_eq!(ModemLines::DSR.bits(), 0x100);
        assert_eq!(ModemLines::status_lines().bits(), 0x1e0);
    }

    #[test]
    fn test_line_event_json_mapping() {
        let event: LineEvent =
            serde_json::from_str(r#"{"event": "carrier_detect", "level": true}"#).unwrap();
        assert_eq!(event, LineEvent::CarrierDetect(true));

        let event: LineEvent = serde_json::from_str(r#"{"event": "frame_error"}"#).unwrap();
        assert_eq!(event, LineEvent::FrameError);
    }
}

// ============================================================================
// Error Tests
// ============================================================================

#[cfg(test)]
mod error_tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_bridge_error_display() {
        let err = BridgeError::PeerNotAttached {
            slot: 1,
            side: Side::Commander,
        };
        assert_eq!(err.to_string(), "Slot 1: commander endpoint is not attached");

        let err = BridgeError::ProtocolDesync {
            slot: 0,
            side: Side::Device,
            capacity: 512,
        };
        assert_eq!(
            err.to_string(),
            "Slot 0: device echo history overflow (512 bytes unreconciled)"
        );
    }

    #[test]
    fn test_transient_errors() {
        assert!(BridgeError::PortNotOpen { slot: 0, side: Side::Device }.is_transient());
        assert!(!BridgeError::ProtocolDesync { slot: 0, side: Side::Device, capacity: 1 }.is_transient());
        assert!(!BridgeError::Interrupted.is_transient());
    }

    #[test]
    fn test_app_error_from_bridge_error_keeps_kind() {
        // Arrange
        let bridge = BridgeError::InvalidIndex { index: 9, slots: 4 };

        // Act
        let app: AppError = bridge.clone().into();

        // Assert
        assert_eq!(app.kind(), "InvalidIndex");
        assert_eq!(app.to_string(), bridge.to_string());
        assert!(app.source().is_some());
    }

    #[test]
    fn test_app_error_display() {
        assert_eq!(
            AppError::UnknownHandle(3).to_string(),
            "No open handle with id 3. Open an endpoint first."
        );
        assert_eq!(
            AppError::InvalidPayload("missing 'slot'".to_string()).to_string(),
            "The request payload is invalid: missing 'slot'"
        );
    }

    #[test]
    fn test_app_error_from_serde() {
        let err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let app: AppError = err.into();
        assert_eq!(app.kind(), "DeserializationError");
        assert!(app.to_string().starts_with("A serialization/deserialization error occurred"));
    }

    #[test]
    fn test_app_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout closed");
        let app: AppError = io.into();
        assert_eq!(app.kind(), "IoError");
        assert!(app.to_string().contains("stdout closed"));
    }
}
