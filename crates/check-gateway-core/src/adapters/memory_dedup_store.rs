//! # In-Memory Dedup Store
//!
//! Process-local store for tests and single-instance development. Claims are
//! not shared between gateway instances.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};
use tokio::time::Instant;

use crate::dedup::{DedupStore, DedupStoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Thread-safe in-memory dedup store.
///
/// Expiry uses the tokio clock. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDedupStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryDedupStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn purge_expired(&self) -> Result<usize, DedupStoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(lock_error)?;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(before - entries.len())
    }
}

fn lock_error<T>(e: std::sync::PoisonError<T>) -> DedupStoreError {
    DedupStoreError::Internal {
        message: format!("Failed to acquire lock: {}", e),
    }
}

#[async_trait]
impl DedupStore for InMemoryDedupStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DedupStoreError> {
        let now = Instant::now();
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DedupStoreError> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.entries
            .write()
            .map_err(lock_error)?
            .insert(key.to_string(), entry);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, DedupStoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(lock_error)?;

        if entries.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), DedupStoreError> {
        self.entries.write().map_err(lock_error)?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_dedup_store_tests.rs"]
mod tests;
