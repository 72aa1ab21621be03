//! Quotes Proxy - A rate-limited caching proxy for a remote quotes API
//!
//! Keeps an id-sorted cache of upstream quotes, caps outbound calls per
//! fixed window, and serves paginated and single-quote views.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod quotes;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use error::{QuoteError, Result};
pub use tasks::spawn_cleanup_task;
