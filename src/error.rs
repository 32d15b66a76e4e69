use crate::bridge::BridgeError;
use crate::config::ConfigError;
use std::fmt;

/// A specialized `Result` type for the service and stdio layers.
pub type AppResult<T> = Result<T, AppError>;

/// Unified application error type.
///
/// Bridge errors pass through unchanged so callers can still match on them;
/// everything else is a front-end concern.
#[derive(Debug)]
pub enum AppError {
    Bridge(BridgeError),
    Config(ConfigError),
    UnknownHandle(u64),
    UnknownWait(String),
    InvalidPayload(String),
    IoError(std::io::Error),
    SerdeError(serde_json::Error),
}

impl AppError {
    /// Stable name used as `error.type` in stdio responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bridge(e) => e.kind(),
            Self::Config(_) => "ConfigError",
            Self::UnknownHandle(_) => "UnknownHandle",
            Self::UnknownWait(_) => "UnknownWait",
            Self::InvalidPayload(_) => "InvalidPayload",
            Self::IoError(_) => "IoError",
            Self::SerdeError(_) => "DeserializationError",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bridge(e) => write!(f, "{e}"),
            Self::Config(e) => write!(f, "{e}"),
            Self::UnknownHandle(id) => write!(f, "No open handle with id {id}. Open an endpoint first."),
            Self::UnknownWait(id) => write!(f, "No pending wait with id '{id}'."),
            Self::InvalidPayload(details) => write!(f, "The request payload is invalid: {details}"),
            Self::IoError(e) => write!(f, "An I/O error occurred: {e}"),
            Self::SerdeError(e) => write!(f, "A serialization/deserialization error occurred: {e}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bridge(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::IoError(e) => Some(e),
            Self::SerdeError(e) => Some(e),
            _ => None,
        }
    }
}

// Implement `From` conversions to allow the `?` operator to work seamlessly.
impl From<BridgeError> for AppError {
    fn from(err: BridgeError) -> Self {
        AppError::Bridge(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerdeError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Side;

    #[test]
    fn test_bridge_kind_passes_through() {
        let err: AppError = BridgeError::PeerNotAttached {
            slot: 1,
            side: Side::Commander,
        }
        .into();
        assert_eq!(err.kind(), "PeerNotAttached");
        assert!(err.to_string().contains("commander"));
    }

    #[test]
    fn test_payload_kind() {
        let err = AppError::InvalidPayload("missing 'slot'".into());
        assert_eq!(err.kind(), "InvalidPayload");
        assert_eq!(err.to_string(), "The request payload is invalid: missing 'slot'");
    }
}
