//! Response DTOs for the quotes proxy API
//!
//! Quote payloads are served as `crate::quotes` types directly; this module
//! holds the operational responses.

use serde::Serialize;

use crate::store::StoreStats;

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Store reads that found a live value
    pub hits: u64,
    /// Store reads that found nothing
    pub misses: u64,
    /// Entries dropped after their TTL elapsed
    pub expirations: u64,
    /// Current number of entries in the store
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Calls made to the upstream quotes API
    pub upstream_calls: u64,
}

impl StatsResponse {
    /// Combines store statistics with the upstream call count.
    pub fn new(stats: &StoreStats, upstream_calls: u64) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
            upstream_calls,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
