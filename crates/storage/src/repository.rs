use async_trait::async_trait;
use quiz_core::model::{SessionKind, SessionSnapshot};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable key/value contract backing resumable sessions.
///
/// Values are opaque strings; a later `put` for the same key replaces the
/// earlier one.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Fetch the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Fixed storage key for the persisted session of a given kind.
#[must_use]
pub fn session_key(kind: SessionKind) -> String {
    format!("{}_session", kind.as_str())
}

/// Typed access to persisted session snapshots on top of a `KeyValueStore`.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Persist the snapshot for `kind`, replacing the previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or the backend write fails.
    pub async fn save(
        &self,
        kind: SessionKind,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError> {
        let body = serde_json::to_string(snapshot)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.kv.put(&session_key(kind), &body).await
    }

    /// Load the snapshot for `kind`, if one was saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored value cannot be decoded.
    pub async fn load(&self, kind: SessionKind) -> Result<Option<SessionSnapshot>, StorageError> {
        let Some(body) = self.kv.get(&session_key(kind)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Drop the snapshot for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    pub async fn clear(&self, kind: SessionKind) -> Result<(), StorageError> {
        self.kv.delete(&session_key(kind)).await
    }
}

/// Simple in-memory store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryRepository {
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// Aggregates storage backends behind trait objects for easy swapping.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KeyValueStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryRepository::new());
        Self { kv }
    }

    #[must_use]
    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(Arc::clone(&self.kv))
    }
}
