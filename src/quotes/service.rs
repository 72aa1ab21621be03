//! Quote Service Module
//!
//! Serves listings and lookups from the cache, going upstream through the
//! rate limiter only when the cache cannot answer.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{QuoteError, Result};
use crate::quotes::{
    Admission, Pagination, Quote, QuoteCache, QuoteListing, RateLimiter, RemoteQuoteSource,
};
use crate::store::KvStore;

/// Store key counting every call made to the upstream API.
pub const UPSTREAM_CALLS_KEY: &str = "quotes_upstream_calls";

/// What the service does when the outbound quota is spent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThrottleMode {
    /// Sleep until the next window opens.
    #[default]
    Block,
    /// Fail with `QuoteError::RateLimited`.
    FailFast,
}

// == Quote Service ==
/// Cache-first quote access with a shared outbound quota.
pub struct QuoteService {
    remote: Arc<dyn RemoteQuoteSource>,
    store: Arc<dyn KvStore>,
    limiter: RateLimiter,
    cache: QuoteCache,
    max_per_page: u64,
    throttle: ThrottleMode,
}

impl QuoteService {
    /// Wires the service from configuration.
    ///
    /// # Arguments
    /// * `config` - Validated before anything is built
    /// * `remote` - Upstream quote source
    /// * `store` - Shared store for the cache, window counter and call count
    /// * `clock` - Time source shared by the limiter and the cache
    ///
    /// Fails with `QuoteError::Config` on out-of-range settings.
    pub fn new(
        config: &Config,
        remote: Arc<dyn RemoteQuoteSource>,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let limiter = RateLimiter::new(
            store.clone(),
            clock.clone(),
            config.rate_limit,
            config.rate_window,
        )?;
        let cache = QuoteCache::new(store.clone(), clock, config.cache_ttl)?;

        Ok(Self {
            remote,
            store,
            limiter,
            cache,
            max_per_page: config.max_per_page,
            throttle: ThrottleMode::default(),
        })
    }

    /// Sets what happens when the outbound quota is spent.
    pub fn with_throttle_mode(mut self, throttle: ThrottleMode) -> Self {
        self.throttle = throttle;
        self
    }

    /// The cache backing every lookup.
    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    // == List Quotes ==
    /// Returns page `page` of the id-sorted cache, fetching from upstream
    /// first when fewer than `page * per_page` quotes are cached.
    ///
    /// The fetched upstream page is merged, then the slice is cut from the
    /// cache, so a sparsely filled cache can serve different quotes than
    /// the literal upstream page.
    pub async fn list_quotes(&self, page: u64, per_page: u64) -> Result<QuoteListing> {
        self.validate_page(page, per_page)?;
        self.acquire().await?;

        let offset = (page - 1).saturating_mul(per_page);
        let needed = page.saturating_mul(per_page);

        let mut state = self.cache.load().await?;
        if state.is_empty() || (state.len() as u64) < needed {
            debug!(
                "Cache holds {} quotes, page {} needs {}; fetching upstream",
                state.len(),
                page,
                needed
            );
            self.count_upstream_call().await?;
            let fetched = self.remote.fetch_page(offset, per_page).await?;
            state = self.cache.merge_bulk(fetched.quotes, fetched.total).await?;
            // The fetch already happened, so this second charge must not
            // turn its result into an error
            self.charge_completed().await?;
        }

        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let len = usize::try_from(per_page).unwrap_or(usize::MAX);

        Ok(QuoteListing {
            quotes: state.slice(start, len).to_vec(),
            pagination: Pagination::new(page, per_page, state.total_count()),
        })
    }

    // == Get Quote ==
    /// Looks `id` up in the cache. On a miss the upstream is asked only
    /// while the cache is completely empty.
    pub async fn get_quote(&self, id: u64) -> Result<Option<Quote>> {
        let state = self.cache.load().await?;
        if let Some(quote) = state.find_by_id(id).and_then(|index| state.get(index)) {
            debug!("Cache hit for quote {}", id);
            return Ok(Some(quote.clone()));
        }

        debug!("Cache miss for quote {}", id);
        self.acquire().await?;

        if !state.is_empty() {
            return Ok(None);
        }

        self.count_upstream_call().await?;
        let fetched = self.remote.fetch_by_id(id).await;
        self.keep_fetched(fetched, "quote lookup").await
    }

    // == Get Random Quote ==
    /// Fetches a random quote upstream and caches it.
    pub async fn get_random_quote(&self) -> Result<Option<Quote>> {
        self.acquire().await?;
        self.count_upstream_call().await?;
        let fetched = self.remote.fetch_random().await;
        self.keep_fetched(fetched, "random quote").await
    }

    /// Number of upstream calls recorded in the store.
    ///
    /// Reads without counting as a store hit or miss.
    pub async fn upstream_calls(&self) -> Result<u64> {
        Ok(self
            .store
            .peek(UPSTREAM_CALLS_KEY)
            .await?
            .and_then(|value| value.as_u64())
            .unwrap_or(0))
    }

    /// Caches a fetched quote. Upstream failures degrade to `None`.
    async fn keep_fetched(&self, fetched: Result<Option<Quote>>, what: &str) -> Result<Option<Quote>> {
        match fetched {
            Ok(Some(quote)) => {
                self.cache.insert_one(quote.clone()).await?;
                Ok(Some(quote))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!("Upstream {} failed: {}", what, e);
                Ok(None)
            }
        }
    }

    async fn acquire(&self) -> Result<()> {
        match self.throttle {
            ThrottleMode::Block => self.limiter.gate().await,
            ThrottleMode::FailFast => match self.limiter.try_acquire().await? {
                Admission::Granted => Ok(()),
                Admission::RetryAfter(wait) => Err(QuoteError::RateLimited {
                    retry_after_secs: wait.as_secs(),
                }),
            },
        }
    }

    /// Charges a call that was already made. Only blocking mode waits here.
    async fn charge_completed(&self) -> Result<()> {
        match self.throttle {
            ThrottleMode::Block => self.limiter.gate().await,
            ThrottleMode::FailFast => self.limiter.record().await,
        }
    }

    async fn count_upstream_call(&self) -> Result<()> {
        self.store.increment(UPSTREAM_CALLS_KEY).await?;
        Ok(())
    }

    fn validate_page(&self, page: u64, per_page: u64) -> Result<()> {
        if page == 0 {
            return Err(QuoteError::InvalidRequest("page must be at least 1".to_string()));
        }
        if per_page == 0 || per_page > self.max_per_page {
            return Err(QuoteError::InvalidRequest(format!(
                "per_page must be between 1 and {}",
                self.max_per_page
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::quotes::QuotePage;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Upstream double serving ids `1..=total` and counting calls.
    #[derive(Default)]
    struct FakeSource {
        total: u64,
        fail: bool,
        page_calls: AtomicUsize,
        id_calls: AtomicUsize,
        random_calls: AtomicUsize,
    }

    impl FakeSource {
        fn with_total(total: u64) -> Self {
            Self {
                total,
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.page_calls.load(Ordering::SeqCst)
                + self.id_calls.load(Ordering::SeqCst)
                + self.random_calls.load(Ordering::SeqCst)
        }
    }

    fn quote(id: u64) -> Quote {
        Quote::new(id).with("quote", format!("Quote #{}", id))
    }

    #[async_trait]
    impl RemoteQuoteSource for FakeSource {
        async fn fetch_page(&self, offset: u64, limit: u64) -> Result<QuotePage> {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(QuoteError::Remote("upstream down".to_string()));
            }
            let end = (offset + limit).min(self.total);
            Ok(QuotePage {
                quotes: (offset + 1..=end).map(quote).collect(),
                total: self.total,
            })
        }

        async fn fetch_by_id(&self, id: u64) -> Result<Option<Quote>> {
            self.id_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(QuoteError::Remote("upstream down".to_string()));
            }
            Ok((id >= 1 && id <= self.total).then(|| quote(id)))
        }

        async fn fetch_random(&self) -> Result<Option<Quote>> {
            self.random_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Ok(None);
            }
            Ok(Some(quote(self.total)))
        }
    }

    struct Harness {
        service: QuoteService,
        source: Arc<FakeSource>,
        clock: Arc<ManualClock>,
    }

    fn harness(source: FakeSource, config: Config) -> Harness {
        let source = Arc::new(source);
        let clock = Arc::new(ManualClock::new(0));
        let service = QuoteService::new(
            &config,
            source.clone(),
            Arc::new(MemoryStore::new()),
            clock.clone(),
        )
        .unwrap();
        Harness {
            service,
            source,
            clock,
        }
    }

    fn default_harness(source: FakeSource) -> Harness {
        harness(source, Config::default())
    }

    async fn seed(service: &QuoteService, ids: &[u64]) {
        service
            .cache()
            .merge_bulk(ids.iter().copied().map(quote).collect(), ids.len() as u64)
            .await
            .unwrap();
    }

    #[test]
    fn test_new_rejects_zero_rate_limit() {
        let config = Config {
            rate_limit: 0,
            ..Config::default()
        };
        let result = QuoteService::new(
            &config,
            Arc::new(FakeSource::default()),
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(0)),
        );
        assert!(matches!(result, Err(QuoteError::Config(_))));
    }

    #[test]
    fn test_new_rejects_unbounded_durations() {
        let configs = [
            Config {
                cache_ttl: 10_000_000_000_000,
                ..Config::default()
            },
            Config {
                rate_window: u64::MAX / 100,
                ..Config::default()
            },
        ];
        for config in configs {
            let result = QuoteService::new(
                &config,
                Arc::new(FakeSource::default()),
                Arc::new(MemoryStore::new()),
                Arc::new(ManualClock::new(0)),
            );
            assert!(matches!(result, Err(QuoteError::Config(_))));
        }
    }

    #[tokio::test]
    async fn test_list_quotes_fills_empty_cache() {
        let h = default_harness(FakeSource::with_total(1));

        let listing = h.service.list_quotes(1, 10).await.unwrap();

        assert_eq!(listing.quotes, vec![quote(1)]);
        assert_eq!(listing.pagination, Pagination::new(1, 10, 1));
        assert_eq!(listing.pagination.total_pages, 1);
        assert_eq!(h.source.page_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_list_quotes_served_from_sufficient_cache() {
        let h = default_harness(FakeSource::with_total(100));
        seed(&h.service, &(1..=25).collect::<Vec<_>>()).await;

        let listing = h.service.list_quotes(1, 10).await.unwrap();

        assert_eq!(listing.quotes.len(), 10);
        assert_eq!(listing.quotes[0].id, 1);
        assert_eq!(h.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_list_quotes_later_page_fetches_and_pages() {
        let h = default_harness(FakeSource::with_total(45));

        h.service.list_quotes(1, 10).await.unwrap();
        let listing = h.service.list_quotes(2, 10).await.unwrap();

        let ids: Vec<u64> = listing.quotes.iter().map(|q| q.id).collect();
        assert_eq!(ids, (11..=20).collect::<Vec<_>>());
        assert_eq!(listing.pagination.total, 45);
        assert_eq!(listing.pagination.total_pages, 5);
        assert_eq!(h.source.page_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_list_quotes_returns_at_most_per_page() {
        let h = default_harness(FakeSource::with_total(100));
        seed(&h.service, &(1..=60).collect::<Vec<_>>()).await;

        for per_page in [1, 7, 30] {
            let listing = h.service.list_quotes(1, per_page).await.unwrap();
            assert!(listing.quotes.len() as u64 <= per_page);
        }
    }

    #[tokio::test]
    async fn test_list_quotes_rejects_bad_paging() {
        let h = default_harness(FakeSource::with_total(10));

        assert!(matches!(
            h.service.list_quotes(0, 10).await,
            Err(QuoteError::InvalidRequest(_))
        ));
        assert!(matches!(
            h.service.list_quotes(1, 0).await,
            Err(QuoteError::InvalidRequest(_))
        ));
        assert!(matches!(
            h.service.list_quotes(1, 101).await,
            Err(QuoteError::InvalidRequest(_))
        ));
        assert_eq!(h.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_list_quotes_propagates_upstream_failure() {
        let h = default_harness(FakeSource::failing());

        let result = h.service.list_quotes(1, 10).await;
        assert!(matches!(result, Err(QuoteError::Remote(_))));
    }

    #[tokio::test]
    async fn test_get_quote_cache_hit_makes_no_remote_call() {
        let h = default_harness(FakeSource::with_total(10));
        seed(&h.service, &[1, 3, 5]).await;

        let first = h.service.get_quote(3).await.unwrap();
        let second = h.service.get_quote(3).await.unwrap();

        assert_eq!(first, Some(quote(3)));
        assert_eq!(first, second);
        assert_eq!(h.source.calls(), 0);
        assert_eq!(h.service.upstream_calls().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_quote_miss_on_populated_cache_stays_local() {
        let h = default_harness(FakeSource::with_total(100));
        seed(&h.service, &[1, 3, 5]).await;

        assert_eq!(h.service.get_quote(99).await.unwrap(), None);
        assert_eq!(h.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_get_quote_empty_cache_fetches_and_caches() {
        let h = default_harness(FakeSource::with_total(10));

        assert_eq!(h.service.get_quote(2).await.unwrap(), Some(quote(2)));

        let state = h.service.cache().load().await.unwrap();
        assert_eq!(state.find_by_id(2), Some(0));

        // Second lookup is a cache hit
        h.service.get_quote(2).await.unwrap();
        assert_eq!(h.source.id_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.service.upstream_calls().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_quote_unknown_upstream_is_absent() {
        let h = default_harness(FakeSource::with_total(10));

        assert_eq!(h.service.get_quote(500).await.unwrap(), None);
        assert!(h.service.cache().load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_quote_upstream_error_degrades_to_absent() {
        let h = default_harness(FakeSource::failing());

        assert_eq!(h.service.get_quote(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_random_quote_caches_result() {
        let h = default_harness(FakeSource::with_total(42));

        let random = h.service.get_random_quote().await.unwrap();

        assert_eq!(random, Some(quote(42)));
        let state = h.service.cache().load().await.unwrap();
        assert!(state.find_by_id(42).is_some());
    }

    #[tokio::test]
    async fn test_get_random_quote_failure_is_absent() {
        let h = default_harness(FakeSource::failing());

        assert_eq!(h.service.get_random_quote().await.unwrap(), None);
        assert_eq!(h.source.random_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blocking_mode_waits_when_quota_spent() {
        let config = Config {
            rate_limit: 1,
            rate_window: 60,
            ..Config::default()
        };
        let h = harness(FakeSource::with_total(10), config);

        h.service.get_random_quote().await.unwrap();
        h.service.get_random_quote().await.unwrap();

        let sleeps = h.clock.sleeps();
        assert_eq!(sleeps.len(), 1);
        assert!(sleeps[0] <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_fail_fast_mode_reports_retry_after() {
        let config = Config {
            rate_limit: 1,
            rate_window: 60,
            ..Config::default()
        };
        let Harness { service, clock, .. } = harness(FakeSource::with_total(10), config);
        let service = service.with_throttle_mode(ThrottleMode::FailFast);

        service.get_random_quote().await.unwrap();
        let result = service.get_random_quote().await;

        assert!(matches!(
            result,
            Err(QuoteError::RateLimited { retry_after_secs: 60 })
        ));
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_fail_fast_listing_on_empty_cache_returns_fetched_page() {
        let config = Config {
            rate_limit: 1,
            rate_window: 60,
            ..Config::default()
        };
        let Harness { service, source, clock } = harness(FakeSource::with_total(50), config);
        let service = service.with_throttle_mode(ThrottleMode::FailFast);

        let listing = service.list_quotes(1, 10).await.unwrap();

        assert_eq!(listing.quotes.len(), 10);
        assert_eq!(source.page_calls.load(Ordering::SeqCst), 1);
        assert!(clock.sleeps().is_empty());

        // Both charges landed, so the next request in this window is refused
        assert!(matches!(
            service.list_quotes(1, 10).await,
            Err(QuoteError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    async fn test_upstream_calls_does_not_move_store_stats() {
        let store = Arc::new(MemoryStore::new());
        let service = QuoteService::new(
            &Config::default(),
            Arc::new(FakeSource::with_total(10)),
            store.clone(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();

        service.get_random_quote().await.unwrap();
        let before = store.stats().await;

        for _ in 0..3 {
            assert_eq!(service.upstream_calls().await.unwrap(), 1);
        }

        let after = store.stats().await;
        assert_eq!(after.hits, before.hits);
        assert_eq!(after.misses, before.misses);
    }
}
