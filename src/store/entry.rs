//! Store Entry Module
//!
//! Defines a single stored value with its TTL metadata.

use serde_json::Value;

use crate::clock::current_timestamp_ms;

// == Store Entry ==
/// A stored JSON value plus expiry metadata.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    /// The stored value
    pub value: Value,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl StoreEntry {
    // == Constructor ==
    /// Creates a new entry with optional TTL.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl_seconds` - Optional TTL in seconds
    pub fn new(value: Value, ttl_seconds: Option<u64>) -> Self {
        let now = current_timestamp_ms();
        // Saturates: an absurd TTL means "effectively never", not a wrap.
        let expires_at = ttl_seconds.map(|ttl| now.saturating_add(ttl.saturating_mul(1000)));

        Self {
            value,
            created_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its expiration time.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }

    /// Remaining TTL in milliseconds, `None` when the entry never expires.
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()))
    }
}
