//! Local persistent storage and the offline task cache.
//!
//! [`KeyValueStore`] is the on-device string store shared by the task cache
//! and the session's token keys. [`TaskCache`] mirrors the full canonical
//! task set under a single key.
//!
//! # Cache failures are never fatal
//!
//! - A failed or corrupt [`TaskCache::load`] is logged and yields an empty
//!   set, as if no cache existed.
//! - A failed [`TaskCache::write_through`] is logged and marks the cache
//!   stale. The in-memory set is unaffected and the next successful write
//!   brings the cache up to date again.

pub mod file;

pub use file::FileKeyValueStore;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use taskdeck_proto::task::Task;

/// Key holding the serialized task set.
pub const TASKS_KEY: &str = "tasks";

/// Errors that can occur during key-value storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying storage is missing or unusable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A write operation failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// A read operation failed.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// Stored bytes could not be decoded.
    #[error("corrupt entry: {0}")]
    Corrupt(String),
}

/// String key-value storage that survives restarts.
///
/// Implementations include:
/// - [`FileKeyValueStore`] -- one file per key in a data directory
/// - [`InMemoryKeyValueStore`] -- process-local, for tests and ephemeral runs
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the value cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes `key`. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the storage cannot be modified.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory [`KeyValueStore`] with a switch that simulates unavailable storage.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl InMemoryKeyValueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Byte-level mirror of the canonical task set in a [`KeyValueStore`].
///
/// The cache does not validate task invariants; it stores and returns
/// whatever sequence it is given.
pub struct TaskCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
    stale: AtomicBool,
}

impl TaskCache {
    /// A cache under the default [`TASKS_KEY`].
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, TASKS_KEY)
    }

    /// A cache under a custom key.
    #[must_use]
    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            stale: AtomicBool::new(false),
        }
    }

    /// Reads the cached task set.
    ///
    /// Returns an empty sequence when nothing is cached, the storage is
    /// unavailable, or the stored JSON is corrupt.
    #[must_use]
    pub fn load(&self) -> Vec<Task> {
        match self.try_load() {
            Ok(tasks) => tasks,
            Err(err) => {
                tracing::warn!(
                    key = %self.key,
                    error = %err,
                    "task cache unreadable, starting empty"
                );
                Vec::new()
            }
        }
    }

    fn try_load(&self) -> Result<Vec<Task>, StoreError> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    /// Writes the full task set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the set cannot be encoded or stored.
    pub fn save(&self, tasks: &[Task]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(tasks).map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        self.store.set(&self.key, &raw)
    }

    /// Best-effort [`save`](Self::save): failures are logged and mark the
    /// cache stale instead of propagating.
    pub fn write_through(&self, tasks: &[Task]) {
        match self.save(tasks) {
            Ok(()) => {
                if self.stale.swap(false, Ordering::SeqCst) {
                    tracing::info!(key = %self.key, count = tasks.len(), "task cache caught up");
                }
            }
            Err(err) => {
                self.stale.store(true, Ordering::SeqCst);
                tracing::warn!(
                    key = %self.key,
                    count = tasks.len(),
                    error = %err,
                    "task cache write failed, in-memory set kept"
                );
            }
        }
    }

    /// Whether the last write-through failed.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for TaskCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCache")
            .field("key", &self.key)
            .field("stale", &self.is_stale())
            .finish_non_exhaustive()
    }
}
