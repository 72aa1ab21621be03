//! Store Statistics Module
//!
//! Tracks store read metrics.

use serde::Serialize;

// == Store Stats ==
/// Tracks store read performance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// Reads that found a live value
    pub hits: u64,
    /// Reads that found nothing or an expired value
    pub misses: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
    /// Current number of entries in the store
    pub total_entries: usize,
}

impl StoreStats {
    /// Creates a new StoreStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns hits / (hits + misses), or 0.0 if nothing has been read.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Counts a read that found a live value.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Counts a read that found nothing.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Counts `count` entries dropped for an elapsed TTL.
    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    /// Sets the entry count, taken at snapshot time.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
