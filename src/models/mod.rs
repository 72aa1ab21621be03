//! Request and Response models for the quotes proxy API
//!
//! This module defines the DTOs used for query strings and the
//! operational endpoints.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::ListQuotesQuery;
pub use responses::{HealthResponse, StatsResponse};
