//! Configuration module for the bridge.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `VSB_CONFIG` environment variable (explicit path)
//! 2. `./vsb.toml` (current directory)
//! 3. The platform config directory (`~/.config/virtual-serial-bridge/vsb.toml` on Linux)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! - `VSB_BRIDGE_SLOT_COUNT`, `VSB_BRIDGE_HISTORY_CAPACITY`,
//!   `VSB_BRIDGE_READER_QUEUE_CAPACITY`, `VSB_BRIDGE_LEGACY_DTR_QUIRK`
//! - `VSB_LOG_LEVEL`, `VSB_LOG_FORMAT`
//! - `VSB_LINE_BAUD_RATE`
//!
//! # Example
//!
//! ```rust,no_run
//! use virtual_serial_bridge::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//! println!("slots: {}", config.bridge.slot_count);
//! # Ok::<(), virtual_serial_bridge::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{BridgeConfig, Config, DevicesConfig, LogFormat, LoggingConfig};
