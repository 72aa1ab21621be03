//! API Module
//!
//! HTTP handlers and routing for the quotes proxy REST API.
//!
//! # Endpoints
//! - `GET /quotes?page=&per_page=` - Paginated listing
//! - `GET /quotes/random` - Random quote
//! - `GET /quotes/:id` - Single quote
//! - `GET /stats` - Store and upstream statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
