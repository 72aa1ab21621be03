//! Error types for the quotes proxy
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Quote Error Enum ==
/// Unified error type for the quotes proxy.
#[derive(Error, Debug)]
pub enum QuoteError {
    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream quotes API failed or answered with a non-success status
    #[error("Remote unavailable: {0}")]
    Remote(String),

    /// Outbound quota exhausted and the caller asked not to wait
    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Invalid configuration, rejected at construction time
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistence store fault
    #[error("Store error: {0}")]
    Store(String),

    /// Time arithmetic out of range, such as a clock past the year 262143
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for QuoteError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let status = match &self {
            QuoteError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            QuoteError::Remote(_) => StatusCode::BAD_GATEWAY,
            QuoteError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            QuoteError::Config(_) | QuoteError::Store(_) | QuoteError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": message
        }));

        if let QuoteError::RateLimited { retry_after_secs } = self {
            return (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response();
        }

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for QuoteError {
    fn from(err: reqwest::Error) -> Self {
        QuoteError::Remote(err.to_string())
    }
}

impl From<serde_json::Error> for QuoteError {
    fn from(err: serde_json::Error) -> Self {
        QuoteError::Store(format!("Malformed stored value: {}", err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the quotes proxy.
pub type Result<T> = std::result::Result<T, QuoteError>;
