//! Memory Store Module
//!
//! In-process `KvStore` combining a HashMap with TTL expiration.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{QuoteError, Result};
use crate::store::{KvStore, StoreEntry, StoreStats};

#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<String, StoreEntry>,
    stats: StoreStats,
}

impl StoreState {
    fn get(&mut self, key: &str) -> Option<Value> {
        let expired = self.entries.get(key).is_some_and(StoreEntry::is_expired);
        if expired {
            self.entries.remove(key);
            self.stats.record_expirations(1);
        }

        let live = self.entries.get(key).map(|entry| entry.value.clone());

        match live {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        live
    }

    fn increment(&mut self, key: &str) -> Result<i64> {
        let live = self.entries.get(key).filter(|entry| !entry.is_expired());

        let (next, expires_at) = match live {
            Some(entry) => {
                let current = entry.value.as_i64().ok_or_else(|| {
                    QuoteError::Store(format!("Value under '{}' is not an integer", key))
                })?;
                (current + 1, entry.expires_at)
            }
            None => (1, None),
        };

        let mut entry = StoreEntry::new(Value::from(next), None);
        entry.expires_at = expires_at;
        self.entries.insert(key.to_string(), entry);
        Ok(next)
    }

    fn cleanup_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before - self.entries.len();
        self.stats.record_expirations(removed);
        removed
    }
}

// == Memory Store ==
/// Thread-safe in-memory key-value store with per-entry TTL.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Stats ==
    /// Returns current store statistics.
    pub async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries.
    ///
    /// Returns the number of entries removed.
    pub async fn cleanup_expired(&self) -> usize {
        self.state.write().await.cleanup_expired()
    }

    /// Number of entries held, expired or not.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Returns true if the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        // Write lock: expired entries are dropped on read and stats move.
        Ok(self.state.write().await.get(key))
    }

    async fn peek(&self, key: &str) -> Result<Option<Value>> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &str, value: Value, ttl_secs: u64) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .entries
            .insert(key.to_string(), StoreEntry::new(value, Some(ttl_secs)));
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        self.state.write().await.increment(key)
    }
}
