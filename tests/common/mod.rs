//! Shared test utilities for the bridge integration tests.
//!
//! This module provides:
//! - A pool harness wired to in-memory reader queues
//! - Helpers for opening slot pairs and draining what each side received
//! - JSON assertion helpers for the stdio tests

#![allow(dead_code)]

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use virtual_serial_bridge::bridge::{EndpointHandle, PoolSettings, PortSlotPool, Side};
use virtual_serial_bridge::port::{QueueReader, QueueRegistry};

/// Pool plus the registry its readers come from.
pub struct TestHarness {
    pub pool: Arc<PortSlotPool>,
    pub readers: Arc<QueueRegistry>,
}

impl TestHarness {
    /// Default sizing: 4 slots, 512-byte histories.
    pub fn new() -> Self {
        Self::with_settings(PoolSettings::default())
    }

    pub fn with_settings(settings: PoolSettings) -> Self {
        let readers = Arc::new(QueueRegistry::default());
        let pool = Arc::new(PortSlotPool::new(settings, readers.clone()));
        Self { pool, readers }
    }

    /// Small histories make overflow cases cheap to reach.
    pub fn with_history(capacity: usize) -> Self {
        Self::with_settings(PoolSettings {
            history_capacity: capacity,
            ..PoolSettings::default()
        })
    }

    /// Tiny reader queues make drop cases cheap to reach.
    pub fn with_queue_capacity(capacity: usize) -> Self {
        let readers = Arc::new(QueueRegistry::new(capacity));
        let pool = Arc::new(PortSlotPool::new(PoolSettings::default(), readers.clone()));
        Self { pool, readers }
    }

    /// Open both sides of `slot`, device first.
    pub fn open_pair(&self, slot: usize) -> (EndpointHandle, EndpointHandle) {
        let device = self.pool.acquire(slot, Side::Device).expect("device open");
        let commander = self.pool.acquire(slot, Side::Commander).expect("commander open");
        (device, commander)
    }

    pub fn queue(&self, handle: EndpointHandle) -> QueueReader {
        self.readers
            .reader(handle.slot(), handle.side())
            .expect("endpoint was never attached")
    }

    /// Everything delivered to `handle` so far.
    pub fn received(&self, handle: EndpointHandle) -> Vec<u8> {
        self.queue(handle).drain()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll `condition` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Assert that a JSON value contains specific fields with expected values.
///
/// # Example
/// ```ignore
/// let actual = json!({"status": "ok", "result": {"handle": 1, "slot": 0}});
/// assert_json_contains(&actual, &json!({"status": "ok"}));
/// ```
pub fn assert_json_contains(actual: &Value, expected: &Value) {
    match (actual, expected) {
        (Value::Object(actual_map), Value::Object(expected_map)) => {
            for (key, expected_value) in expected_map {
                let actual_value = actual_map
                    .get(key)
                    .unwrap_or_else(|| panic!("Expected key '{}' not found in {}", key, actual));
                assert_json_contains(actual_value, expected_value);
            }
        }
        _ => assert_eq!(actual, expected, "JSON values differ"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_pair_attaches_both_queues() {
        let harness = TestHarness::new();
        let (device, commander) = harness.open_pair(1);
        assert_eq!(harness.queue(device).name(), "ttyVirtualDevice1");
        assert_eq!(harness.queue(commander).name(), "ttyVirtualCommander1");
    }

    #[test]
    fn test_assert_json_contains_object() {
        let actual = serde_json::json!({ "status": "ok", "result": { "handle": 1, "slot": 0 } });
        assert_json_contains(&actual, &serde_json::json!({ "result": { "slot": 0 } }));
    }
}
