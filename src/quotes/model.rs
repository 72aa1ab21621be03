//! Quote data model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single upstream record.
///
/// `id` is the only field with guaranteed identity; everything else the
/// upstream sends is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: u64,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Quote {
    /// Creates a quote carrying only its id.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            attributes: Map::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// One bulk-fetch response from the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotePage {
    pub quotes: Vec<Quote>,
    /// Total number of quotes the upstream reports as available
    pub total: u64,
}

/// Pagination metadata for a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    /// Builds pagination metadata; `total_pages` rounds up.
    ///
    /// # Arguments
    /// * `current_page` - 1-based page number
    /// * `per_page` - Page size, treated as 1 if zero
    /// * `total` - Total quotes the upstream reports
    pub fn new(current_page: u64, per_page: u64, total: u64) -> Self {
        Self {
            current_page,
            per_page,
            total,
            total_pages: total.div_ceil(per_page.max(1)),
        }
    }
}

/// Result of `QuoteService::list_quotes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteListing {
    pub quotes: Vec<Quote>,
    pub pagination: Pagination,
}
