//! Upstream quotes API contract and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{QuoteError, Result};
use crate::quotes::{Quote, QuotePage};

/// The upstream quotes API.
///
/// Implementations do not rate-limit; callers gate every call.
#[async_trait]
pub trait RemoteQuoteSource: Send + Sync {
    /// Fetches `limit` quotes starting at `offset`.
    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<QuotePage>;

    /// Fetches one quote. `Ok(None)` when the upstream has no such quote or
    /// answers with a non-success status.
    async fn fetch_by_id(&self, id: u64) -> Result<Option<Quote>>;

    /// Fetches a random quote. `Ok(None)` on a non-success status.
    async fn fetch_random(&self) -> Result<Option<Quote>>;
}

// == HTTP Source ==
/// `RemoteQuoteSource` over a dummyjson-style REST API:
/// `GET /quotes?limit=&skip=`, `GET /quotes/{id}`, `GET /quotes/random`.
#[derive(Clone)]
pub struct HttpQuoteSource {
    client: Client,
    base_url: String,
}

impl HttpQuoteSource {
    // == Constructor ==
    /// Creates a source for the API rooted at `base_url`.
    ///
    /// # Arguments
    /// * `base_url` - API root; a trailing slash is stripped
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QuoteError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
        })
    }

    /// API root without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_optional(&self, path: &str) -> Result<Option<Quote>> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            debug!("GET {} answered {}", url, response.status());
            return Ok(None);
        }

        Ok(Some(response.json::<Quote>().await?))
    }
}

#[async_trait]
impl RemoteQuoteSource for HttpQuoteSource {
    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<QuotePage> {
        let url = format!("{}/quotes", self.base_url);
        debug!("Fetching quotes page: skip={}, limit={}", offset, limit);

        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit), ("skip", offset)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QuoteError::Remote(format!(
                "GET {} answered {}",
                url,
                response.status()
            )));
        }

        Ok(response.json::<QuotePage>().await?)
    }

    async fn fetch_by_id(&self, id: u64) -> Result<Option<Quote>> {
        self.get_optional(&format!("/quotes/{}", id)).await
    }

    async fn fetch_random(&self) -> Result<Option<Quote>> {
        self.get_optional("/quotes/random").await
    }
}
