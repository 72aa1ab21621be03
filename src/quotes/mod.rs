//! Quotes Module
//!
//! The caching, rate-limiting and lookup engine in front of the upstream
//! quotes API.

mod cache;
mod model;
mod rate_limiter;
mod remote;
mod service;


pub use cache::{CacheState, QuoteCache, QUOTES_KEY, TOTAL_KEY};
pub use model::{Pagination, Quote, QuoteListing, QuotePage};
pub use rate_limiter::{Admission, RateLimiter, RateWindow, RATE_LIMIT_KEY};
pub use remote::{HttpQuoteSource, RemoteQuoteSource};
pub use service::{QuoteService, ThrottleMode, UPSTREAM_CALLS_KEY};
