//! Quote Cache Module
//!
//! Ordered, deduplicated, id-sorted view of every quote fetched so far,
//! persisted through a `KvStore` with TTL.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::clock::Clock;
use crate::config::MAX_CACHE_TTL_SECS;
use crate::error::{QuoteError, Result};
use crate::quotes::Quote;
use crate::store::KvStore;

/// Store key holding the sorted quote list.
pub const QUOTES_KEY: &str = "quotes_cache";
/// Store key holding the upstream-reported total.
pub const TOTAL_KEY: &str = "quotes_total";

#[derive(Debug, Serialize, Deserialize)]
struct CachedQuotes {
    records: Vec<Quote>,
    expires_at: DateTime<Utc>,
}

// == Cache State ==
/// Snapshot of the cached quotes.
///
/// `records` is strictly ascending by `id` after every mutation.
/// `total_count` is what the upstream last reported, which may exceed
/// `records.len()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheState {
    records: Vec<Quote>,
    total_count: u64,
    expires_at: Option<DateTime<Utc>>,
}

impl CacheState {
    /// Builds a state from arbitrary records, sorting and deduplicating them.
    /// Later records win over earlier ones with the same id.
    pub fn from_records(records: Vec<Quote>, total_count: u64) -> Self {
        let mut state = Self {
            records: Vec::new(),
            total_count,
            expires_at: None,
        };
        state.merge_bulk(records, total_count);
        state
    }

    /// Returns true if no quotes are cached.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of cached quotes.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Quote at `index` in id order.
    pub fn get(&self, index: usize) -> Option<&Quote> {
        self.records.get(index)
    }

    /// All cached quotes in id order.
    pub fn records(&self) -> &[Quote] {
        &self.records
    }

    /// Total the upstream last reported.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// When the persisted copy expires; `None` before the first write.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Position of `id` in the sorted records, by binary search.
    pub fn find_by_id(&self, id: u64) -> Option<usize> {
        self.records.binary_search_by_key(&id, |quote| quote.id).ok()
    }

    /// Records in positions `[start, start + len)`, clipped to what is cached.
    pub fn slice(&self, start: usize, len: usize) -> &[Quote] {
        let start = start.min(self.records.len());
        let end = start.saturating_add(len).min(self.records.len());
        &self.records[start..end]
    }

    /// Merges `incoming` into the records and remembers `reported_total`.
    /// Incoming quotes replace cached ones with the same id.
    pub fn merge_bulk(&mut self, incoming: Vec<Quote>, reported_total: u64) {
        let mut by_id: BTreeMap<u64, Quote> = self
            .records
            .drain(..)
            .map(|quote| (quote.id, quote))
            .collect();
        for quote in incoming {
            by_id.insert(quote.id, quote);
        }
        self.records = by_id.into_values().collect();
        self.total_count = reported_total;
    }

    /// Adds one quote, replacing any cached quote with the same id.
    pub fn insert_one(&mut self, quote: Quote) {
        match self.records.binary_search_by_key(&quote.id, |q| q.id) {
            Ok(index) => self.records[index] = quote,
            Err(index) => self.records.insert(index, quote),
        }
    }
}

// == Quote Cache ==
/// Store-backed quote cache.
///
/// Every mutation reads the current state, applies the change and writes it
/// back. There is no transaction around that sequence.
#[derive(Clone)]
pub struct QuoteCache {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    ttl_secs: u64,
}

impl QuoteCache {
    // == Constructor ==
    /// Creates a cache over `store`.
    ///
    /// # Arguments
    /// * `store` - Shared store holding the quote list and total
    /// * `clock` - Time source for expiry stamps
    /// * `ttl_secs` - Lifetime of each write, between 1 and `MAX_CACHE_TTL_SECS`
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, ttl_secs: u64) -> Result<Self> {
        if ttl_secs == 0 || ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(QuoteError::Config(format!(
                "cache_ttl must be between 1 and {} seconds",
                MAX_CACHE_TTL_SECS
            )));
        }
        Ok(Self {
            store,
            clock,
            ttl_secs,
        })
    }

    // == Load ==
    /// Reads the current state. Missing or expired data reads as empty.
    pub async fn load(&self) -> Result<CacheState> {
        let now = self.now()?;
        let cached = match self.store.get(QUOTES_KEY).await? {
            Some(value) => Some(serde_json::from_value::<CachedQuotes>(value)?),
            None => None,
        };
        let cached = cached.filter(|cached| cached.expires_at > now);

        let (records, expires_at) = match cached {
            Some(cached) => (cached.records, Some(cached.expires_at)),
            None => (Vec::new(), None),
        };

        // Without a bulk fetch on record, the best known total is what we hold.
        let total_count = match self.store.get(TOTAL_KEY).await? {
            Some(value) => value.as_u64().unwrap_or(records.len() as u64),
            None => records.len() as u64,
        };

        Ok(CacheState {
            records,
            total_count,
            expires_at,
        })
    }

    // == Merge Bulk ==
    /// Merges a bulk fetch into the cache and persists the result.
    ///
    /// # Arguments
    /// * `incoming` - Quotes from one upstream page
    /// * `reported_total` - Total the upstream reported alongside them
    pub async fn merge_bulk(&self, incoming: Vec<Quote>, reported_total: u64) -> Result<CacheState> {
        let mut state = self.load().await?;
        let fetched = incoming.len();
        state.merge_bulk(incoming, reported_total);
        self.persist(&mut state).await?;
        self.store
            .put(TOTAL_KEY, Value::from(state.total_count), self.ttl_secs)
            .await?;

        debug!(
            "Merged {} quotes into cache ({} cached, {} reported)",
            fetched,
            state.len(),
            state.total_count
        );
        Ok(state)
    }

    // == Insert One ==
    /// Inserts a single quote and persists the result.
    pub async fn insert_one(&self, quote: Quote) -> Result<CacheState> {
        let mut state = self.load().await?;
        state.insert_one(quote);
        self.persist(&mut state).await?;
        Ok(state)
    }

    async fn persist(&self, state: &mut CacheState) -> Result<()> {
        let expires_at = TimeDelta::try_seconds(self.ttl_secs as i64)
            .and_then(|ttl| self.now().ok()?.checked_add_signed(ttl))
            .ok_or_else(|| {
                QuoteError::Internal(format!("Cache expiry out of range for ttl {}s", self.ttl_secs))
            })?;
        let payload = CachedQuotes {
            records: state.records.clone(),
            expires_at,
        };
        self.store
            .put(QUOTES_KEY, serde_json::to_value(&payload)?, self.ttl_secs)
            .await?;
        state.expires_at = Some(expires_at);
        Ok(())
    }

    fn now(&self) -> Result<DateTime<Utc>> {
        i64::try_from(self.clock.now_ms())
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| {
                QuoteError::Internal("Clock is outside the representable range".to_string())
            })
    }
}
