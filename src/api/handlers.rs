//! API Handlers
//!
//! HTTP request handlers for each quotes proxy endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::clock::SystemClock;
use crate::config::Config;
use crate::error::Result;
use crate::models::{HealthResponse, ListQuotesQuery, StatsResponse};
use crate::quotes::{HttpQuoteSource, Quote, QuoteListing, QuoteService};
use crate::store::MemoryStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache, rate limiter and upstream orchestration
    pub service: Arc<QuoteService>,
    /// Store backing the service, kept for stats and cleanup
    pub store: Arc<MemoryStore>,
    /// Page size used when `per_page` is omitted
    pub default_per_page: u64,
}

impl AppState {
    /// Creates a new AppState around an already wired service.
    ///
    /// # Arguments
    /// * `service` - Quote service answering every quotes endpoint
    /// * `store` - The same store the service writes to
    /// * `default_per_page` - Page size when the query omits one
    pub fn new(service: QuoteService, store: Arc<MemoryStore>, default_per_page: u64) -> Self {
        Self {
            service: Arc::new(service),
            store,
            default_per_page,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Wires an HTTP upstream, an in-memory store and the system clock.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let remote = HttpQuoteSource::new(
            &config.base_url,
            Duration::from_secs(config.request_timeout),
        )?;
        let service = QuoteService::new(
            config,
            Arc::new(remote),
            store.clone(),
            Arc::new(SystemClock),
        )?;
        Ok(Self::new(service, store, config.default_per_page))
    }
}

/// Handler for GET /quotes
///
/// Returns one page of quotes plus pagination metadata.
pub async fn list_quotes_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuotesQuery>,
) -> Result<Json<QuoteListing>> {
    let (page, per_page) = query.resolve(state.default_per_page);
    let listing = state.service.list_quotes(page, per_page).await?;
    Ok(Json(listing))
}

/// Handler for GET /quotes/random
///
/// Returns a random quote, or `null` when the upstream has none to give.
pub async fn random_quote_handler(State(state): State<AppState>) -> Result<Json<Option<Quote>>> {
    Ok(Json(state.service.get_random_quote().await?))
}

/// Handler for GET /quotes/:id
///
/// Returns the quote, or `null` when it cannot be resolved.
pub async fn get_quote_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Option<Quote>>> {
    Ok(Json(state.service.get_quote(id).await?))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let upstream_calls = state.service.upstream_calls().await?;
    let stats = state.store.stats().await;
    Ok(Json(StatsResponse::new(&stats, upstream_calls)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
