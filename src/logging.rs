//! Tracing subscriber setup for the `vsb` binary.
//!
//! Logs always go to stderr; stdout belongs to the JSON-lines protocol.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` wins, then `override_level`, then the config level.
pub fn build_filter(config: &LoggingConfig, override_level: Option<&str>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = override_level.unwrap_or(&config.level);
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Returns `false` if one was already installed; calling twice is harmless.
pub fn init(config: &LoggingConfig, override_level: Option<&str>) -> bool {
    let filter = build_filter(config, override_level);

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(config.file_line)
        .with_line_number(config.file_line);

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry.with(layer.json()).try_init(),
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
    };
    result.is_ok()
}
