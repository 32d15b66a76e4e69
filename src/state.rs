use crate::bridge::{CancelToken, EndpointHandle, PortSlotPool};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::port::QueueRegistry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A type alias for the shared, thread-safe application state.
pub type AppState = Arc<BridgeState>;

/// Open handles by the numeric id handed to the client.
#[derive(Debug, Default)]
struct HandleTable {
    next_id: u64,
    open: HashMap<u64, EndpointHandle>,
}

/// Everything one front-end session shares: the pool, the queues its
/// readers drain, and the client-visible handle and wait ids.
pub struct BridgeState {
    pool: PortSlotPool,
    readers: Arc<QueueRegistry>,
    handles: Mutex<HandleTable>,
    waits: Mutex<HashMap<String, CancelToken>>,
}

impl BridgeState {
    pub fn new(config: &Config) -> Self {
        let readers = Arc::new(QueueRegistry::with_prefixes(
            config.bridge.reader_queue_capacity,
            config.devices.device_prefix.clone(),
            config.devices.commander_prefix.clone(),
        ));
        let pool = PortSlotPool::new(config.pool_settings(), readers.clone());
        Self {
            pool,
            readers,
            handles: Mutex::new(HandleTable::default()),
            waits: Mutex::new(HashMap::new()),
        }
    }

    /// Shared state built from `config`.
    pub fn shared(config: &Config) -> AppState {
        Arc::new(Self::new(config))
    }

    pub fn pool(&self) -> &PortSlotPool {
        &self.pool
    }

    pub fn readers(&self) -> &QueueRegistry {
        &self.readers
    }

    /// Register `handle` and return its client id. Ids are never reused.
    pub fn register(&self, handle: EndpointHandle) -> u64 {
        let mut table = self.handles.lock();
        table.next_id += 1;
        let id = table.next_id;
        table.open.insert(id, handle);
        id
    }

    pub fn lookup(&self, id: u64) -> AppResult<EndpointHandle> {
        self.handles
            .lock()
            .open
            .get(&id)
            .copied()
            .ok_or(AppError::UnknownHandle(id))
    }

    pub fn unregister(&self, id: u64) -> AppResult<EndpointHandle> {
        self.handles
            .lock()
            .open
            .remove(&id)
            .ok_or(AppError::UnknownHandle(id))
    }

    /// Ids of every registered handle, sorted.
    pub fn open_handles(&self) -> Vec<(u64, EndpointHandle)> {
        let mut open: Vec<_> = self
            .handles
            .lock()
            .open
            .iter()
            .map(|(id, handle)| (*id, *handle))
            .collect();
        open.sort_by_key(|(id, _)| *id);
        open
    }

    /// Start tracking a wait. Fails if `wait_id` is already pending.
    pub fn begin_wait(&self, wait_id: &str) -> AppResult<CancelToken> {
        let mut waits = self.waits.lock();
        if waits.contains_key(wait_id) {
            return Err(AppError::InvalidPayload(format!(
                "wait id '{wait_id}' is already pending"
            )));
        }
        let token = CancelToken::new();
        waits.insert(wait_id.to_string(), token.clone());
        Ok(token)
    }

    pub fn end_wait(&self, wait_id: &str) {
        self.waits.lock().remove(wait_id);
    }

    /// Fire the token of a pending wait.
    pub fn cancel_wait(&self, wait_id: &str) -> AppResult<()> {
        let token = self
            .waits
            .lock()
            .get(wait_id)
            .cloned()
            .ok_or_else(|| AppError::UnknownWait(wait_id.to_string()))?;
        token.cancel();
        Ok(())
    }

    pub fn pending_waits(&self) -> usize {
        self.waits.lock().len()
    }

    /// Cancel pending waits, release every handle and shut the pool down.
    pub fn shutdown(&self) -> usize {
        let tokens: Vec<CancelToken> = self.waits.lock().values().cloned().collect();
        for token in tokens {
            token.cancel();
        }
        self.handles.lock().open.clear();
        self.pool.shutdown()
    }
}

impl std::fmt::Debug for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeState")
            .field("pool", &self.pool)
            .field("handles", &self.handles.lock().open.len())
            .field("waits", &self.waits.lock().len())
            .finish()
    }
}
