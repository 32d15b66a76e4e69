//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! Every section has defaults, so an empty file is a valid configuration.

use super::error::{ConfigError, ConfigResult};
use crate::bridge::{PoolSettings, DEFAULT_HISTORY_CAPACITY, DEFAULT_SLOT_COUNT};
use crate::port::{LineConfig, DEFAULT_QUEUE_CAPACITY};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Slot pool sizing and behaviour
    pub bridge: BridgeConfig,
    /// Node naming
    pub devices: DevicesConfig,
    /// Line settings every endpoint starts with
    pub line: LineConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values the pool cannot be built with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.bridge.slot_count == 0 {
            return Err(ConfigError::validation("bridge.slot_count", "must be at least 1"));
        }
        if self.bridge.history_capacity == 0 {
            return Err(ConfigError::validation(
                "bridge.history_capacity",
                "must be at least 1",
            ));
        }
        if self.bridge.reader_queue_capacity == 0 {
            return Err(ConfigError::validation(
                "bridge.reader_queue_capacity",
                "must be at least 1",
            ));
        }
        if self.line.baud_rate == 0 {
            return Err(ConfigError::validation("line.baud_rate", "must be non-zero"));
        }
        if self.devices.device_prefix == self.devices.commander_prefix {
            return Err(ConfigError::validation(
                "devices.commander_prefix",
                "must differ from devices.device_prefix",
            ));
        }
        Ok(())
    }

    /// Settings for building a [`PortSlotPool`](crate::bridge::PortSlotPool).
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            slot_count: self.bridge.slot_count,
            history_capacity: self.bridge.history_capacity,
            legacy_dtr_quirk: self.bridge.legacy_dtr_quirk,
            line: self.line.clone(),
        }
    }
}

/// Bridge configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Number of slots
    pub slot_count: usize,
    /// Echo history bytes per endpoint
    pub history_capacity: usize,
    /// Bytes each endpoint's reader queue holds
    pub reader_queue_capacity: usize,
    /// Map DTR requests onto the RTS bit like the historical driver
    pub legacy_dtr_quirk: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            reader_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            legacy_dtr_quirk: false,
        }
    }
}

/// Device node naming section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    pub device_prefix: String,
    pub commander_prefix: String,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            device_prefix: "ttyVirtualDevice".to_string(),
            commander_prefix: "ttyVirtualCommander".to_string(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive: "trace", "debug", "info", "warn", "error" or a full `EnvFilter` string
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
    /// Include source file and line in each event
    pub file_line: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file_line: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::Parity;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bridge.slot_count, 4);
        assert_eq!(config.bridge.history_capacity, 512);
        assert!(!config.bridge.legacy_dtr_quirk);
        assert_eq!(config.line.baud_rate, 9600);
        assert_eq!(config.devices.device_prefix, "ttyVirtualDevice");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[bridge]"));
        assert!(toml_str.contains("[line]"));
        assert!(toml_str.contains("[logging]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [bridge]
            slot_count = 8

            [line]
            baud_rate = 115200
            parity = "even"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bridge.slot_count, 8);
        assert_eq!(config.line.baud_rate, 115200);
        assert_eq!(config.line.parity, Parity::Even);
        // Defaults should still work
        assert_eq!(config.bridge.history_capacity, 512);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let mut config = Config::default();
        config.bridge.history_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bridge.history_capacity"));

        let mut config = Config::default();
        config.line.baud_rate = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pool_settings() {
        let mut config = Config::default();
        config.bridge.legacy_dtr_quirk = true;
        let settings = config.pool_settings();
        assert_eq!(settings.slot_count, 4);
        assert!(settings.legacy_dtr_quirk);
        assert_eq!(settings.line, config.line);
    }
}
