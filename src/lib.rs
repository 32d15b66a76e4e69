//! Virtual Serial Bridge Library
//!
//! Emulates serial-line-connected embedded agents so multi-agent software can
//! be tested without hardware. Each slot pairs a **device** endpoint (what the
//! agent under test talks to) with a **commander** endpoint (what the harness
//! drives); bytes written on one are delivered to the other.
//!
//! # Modules
//!
//! - `bridge`: slots, the forwarding protocol with echo suppression, modem emulation
//! - `port`: collaborator boundary (reader handles) and the in-memory reader queue
//! - `config`: configuration management with TOML support
//! - `error`: front-end error handling
//! - `state`: shared front-end state (pool, queues, client handles)
//! - `service`: DTO layer used by the front ends
//! - `stdio`: JSON-lines command interface
//! - `logging`: tracing subscriber setup
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use virtual_serial_bridge::{PortSlotPool, QueueRegistry, Side};
//!
//! let readers = Arc::new(QueueRegistry::default());
//! let pool = PortSlotPool::with_defaults(readers.clone());
//!
//! let device = pool.acquire(0, Side::Device).unwrap();
//! let commander = pool.acquire(0, Side::Commander).unwrap();
//!
//! assert_eq!(pool.write(commander, b"go\n").unwrap(), 3);
//! let queue = readers.reader(0, Side::Device).unwrap();
//! assert_eq!(queue.drain(), b"go\n".to_vec());
//!
//! // The device reflecting `g` back is recognised as an echo and dropped.
//! assert_eq!(pool.write(device, b"g").unwrap(), 1);
//! assert_eq!(readers.reader(0, Side::Commander).unwrap().available(), 0);
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;
pub mod port;
pub mod service;
pub mod state;
pub mod stdio;

// Re-export commonly used types for convenience
pub use bridge::{
    BridgeError, BridgeResult, CancelToken, EndpointHandle, Forwarded, LineConfigChange,
    LineCounters, LineEvent, ModemLines, PoolSettings, PortSlotPool, Side,
};
pub use error::{AppError, AppResult};
pub use port::{LineConfig, QueueReader, QueueRegistry, ReaderFactory, ReaderHandle};
pub use service::BridgeService;
pub use state::{AppState, BridgeState};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
