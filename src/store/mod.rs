//! Store Module
//!
//! Key-value persistence with TTL that backs both the quote cache and the
//! rate-window counters.

mod entry;
mod memory;
mod stats;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use entry::StoreEntry;
pub use memory::MemoryStore;
pub use stats::StoreStats;

/// Key-value store shared by every request handler.
///
/// Each operation is atomic for its key. Nothing spans keys or
/// read-modify-write sequences, so callers that read, mutate and write back
/// may lose updates under concurrency.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the live value under `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Like `get`, but for observers: it does not count as a store read
    /// and leaves expired entries in place.
    async fn peek(&self, key: &str) -> Result<Option<Value>> {
        self.get(key).await
    }

    /// Stores `value` under `key`, expiring after `ttl_secs`.
    async fn put(&self, key: &str, value: Value, ttl_secs: u64) -> Result<()>;

    /// Adds one to the integer under `key` and returns the new value.
    ///
    /// A missing key starts at 1 and never expires; an existing key keeps
    /// its TTL.
    async fn increment(&self, key: &str) -> Result<i64>;
}
