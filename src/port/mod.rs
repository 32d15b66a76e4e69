//! Collaborator boundary of the bridge.
//!
//! Provides the traits the bridge pushes delivered bytes through, the line
//! settings it reports on, and an in-memory queue implementation used by the
//! stdio harness and the tests.

pub mod queue;
pub mod traits;

pub use queue::{QueueReader, QueueRegistry, DEFAULT_QUEUE_CAPACITY};
pub use traits::*;
