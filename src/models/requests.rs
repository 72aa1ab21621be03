//! Request DTOs for the quotes proxy API
//!
//! Defines the structure of incoming query strings.

use serde::Deserialize;

/// Query string for the listing endpoint (GET /quotes)
///
/// # Fields
/// - `page`: 1-based page number (defaults to 1)
/// - `per_page`: Page size (defaults to the configured page size)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuotesQuery {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u64>,
}

impl ListQuotesQuery {
    /// Resolves omitted values to `(page, per_page)`.
    pub fn resolve(&self, default_per_page: u64) -> (u64, u64) {
        (
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(default_per_page),
        )
    }
}
