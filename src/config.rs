//! Configuration Module
//!
//! Handles loading and validating proxy configuration from environment variables.

use std::env;

use crate::error::{QuoteError, Result};

/// Longest accepted rate window (one day).
pub const MAX_RATE_WINDOW_SECS: u64 = 86_400;

/// Longest accepted cache lifetime (one year).
pub const MAX_CACHE_TTL_SECS: u64 = 31_536_000;

/// Proxy configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root URL of the upstream quotes API
    pub base_url: String,
    /// Maximum outbound calls per rate window
    pub rate_limit: u64,
    /// Rate window length in seconds
    pub rate_window: u64,
    /// Lifetime of the cached quote list in seconds
    pub cache_ttl: u64,
    /// Upper bound accepted for `per_page`
    pub max_per_page: u64,
    /// Page size used when the request omits `per_page`
    pub default_per_page: u64,
    /// Upstream request timeout in seconds
    pub request_timeout: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `QUOTES_API_BASE_URL` - Upstream API root (default: https://dummyjson.com)
    /// - `QUOTES_RATE_LIMIT` - Calls per window (default: 10)
    /// - `QUOTES_RATE_WINDOW` - Window length in seconds (default: 60)
    /// - `QUOTES_CACHE_TTL` - Cache lifetime in seconds (default: 3600)
    /// - `QUOTES_MAX_PER_PAGE` - Largest accepted page size (default: 100)
    /// - `QUOTES_PER_PAGE` - Default page size (default: 10)
    /// - `QUOTES_REQUEST_TIMEOUT` - Upstream timeout in seconds (default: 10)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("QUOTES_API_BASE_URL").unwrap_or(defaults.base_url),
            rate_limit: parse_var("QUOTES_RATE_LIMIT").unwrap_or(defaults.rate_limit),
            rate_window: parse_var("QUOTES_RATE_WINDOW").unwrap_or(defaults.rate_window),
            cache_ttl: parse_var("QUOTES_CACHE_TTL").unwrap_or(defaults.cache_ttl),
            max_per_page: parse_var("QUOTES_MAX_PER_PAGE").unwrap_or(defaults.max_per_page),
            default_per_page: parse_var("QUOTES_PER_PAGE").unwrap_or(defaults.default_per_page),
            request_timeout: parse_var("QUOTES_REQUEST_TIMEOUT")
                .unwrap_or(defaults.request_timeout),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
        }
    }

    /// Rejects settings that would make the proxy unusable.
    ///
    /// A zero quota would block every outbound call forever, so it is a
    /// startup error rather than a runtime state. Windows and TTLs are
    /// capped so expiry arithmetic cannot overflow mid-request.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(QuoteError::Config("base_url cannot be empty".to_string()));
        }
        if self.rate_limit == 0 {
            return Err(QuoteError::Config("rate_limit must be at least 1".to_string()));
        }
        if self.rate_window == 0 || self.rate_window > MAX_RATE_WINDOW_SECS {
            return Err(QuoteError::Config(format!(
                "rate_window must be between 1 and {} seconds",
                MAX_RATE_WINDOW_SECS
            )));
        }
        if self.cache_ttl == 0 || self.cache_ttl > MAX_CACHE_TTL_SECS {
            return Err(QuoteError::Config(format!(
                "cache_ttl must be between 1 and {} seconds",
                MAX_CACHE_TTL_SECS
            )));
        }
        if self.max_per_page == 0 {
            return Err(QuoteError::Config("max_per_page must be at least 1".to_string()));
        }
        if self.default_per_page == 0 || self.default_per_page > self.max_per_page {
            return Err(QuoteError::Config(format!(
                "default_per_page must be between 1 and {}",
                self.max_per_page
            )));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://dummyjson.com".to_string(),
            rate_limit: 10,
            rate_window: 60,
            cache_ttl: 3600,
            max_per_page: 100,
            default_per_page: 10,
            request_timeout: 10,
            server_port: 3000,
            cleanup_interval: 1,
        }
    }
}
