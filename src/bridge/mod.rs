//! The bridge engine: slots of paired endpoints, the forwarding protocol and
//! the modem-status emulation.
//!
//! # Architecture
//!
//! ```text
//! caller ──> PortSlotPool ──> PortSlot (one lock per pair)
//!                               ├─ Device endpoint    ─┐
//!                               └─ Commander endpoint ─┴─> ReaderHandle (collaborator)
//! ```
//!
//! Every operation on a slot runs under that slot's lock. Slots never lock
//! each other, so there is no cross-slot ordering to get wrong.

pub mod cancel;
pub mod endpoint;
pub mod error;
pub mod forward;
pub mod history;
pub mod line_config;
pub mod modem;
pub mod pool;
pub mod slot;

pub use cancel::CancelToken;
pub use endpoint::{Endpoint, Side};
pub use error::{BridgeError, BridgeResult};
pub use forward::{is_line_ending, Forwarded};
pub use history::{EchoHistory, HistoryOverflow, DEFAULT_HISTORY_CAPACITY};
pub use line_config::{apply_config, LineConfigChange, LineDiagnostics, XonXoff};
pub use modem::{LineCounters, LineEvent, Mcr, ModemLines, Msr, SerialInfo};
pub use pool::{EndpointHandle, PoolSettings, PortSlotPool, DEFAULT_SLOT_COUNT, LISTING_HEADER};
pub use slot::{EndpointStatus, PortSlot, SlotStatus};
