//! Bridge error types.
//!
//! Every failure is reported synchronously to the caller, which owns any
//! retry policy. None of them leaves a slot lock held or a history
//! inconsistent.

use super::endpoint::Side;
use thiserror::Error;

/// Errors and non-success outcomes of bridge operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Slot index outside `0..slots`.
    #[error("Slot index {index} is out of range (pool has {slots} slots)")]
    InvalidIndex { index: usize, slots: usize },

    /// The other side of the slot has never been opened.
    #[error("Slot {slot}: {side} endpoint is not attached")]
    PeerNotAttached { slot: usize, side: Side },

    /// The endpoint has no open references.
    #[error("Slot {slot}: {side} endpoint is not open")]
    PortNotOpen { slot: usize, side: Side },

    /// Unreconciled echo history exceeded its capacity.
    #[error("Slot {slot}: {side} echo history overflow ({capacity} bytes unreconciled)")]
    ProtocolDesync {
        slot: usize,
        side: Side,
        capacity: usize,
    },

    /// A status wait woke up without any modem line having changed.
    #[error("Woken without a modem status change")]
    NoChange,

    /// A status wait was cancelled.
    #[error("Wait interrupted")]
    Interrupted,

    /// The endpoint was closed while a caller was waiting on it.
    #[error("Port closed while waiting")]
    PortClosed,
}

impl BridgeError {
    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIndex { .. } => "InvalidIndex",
            Self::PeerNotAttached { .. } => "PeerNotAttached",
            Self::PortNotOpen { .. } => "PortNotOpen",
            Self::ProtocolDesync { .. } => "ProtocolDesync",
            Self::NoChange => "NoChange",
            Self::Interrupted => "Interrupted",
            Self::PortClosed => "PortClosed",
        }
    }

    /// Precondition failures that may succeed if retried later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::PeerNotAttached { .. } | Self::PortNotOpen { .. })
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
