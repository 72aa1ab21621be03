//! API Routes
//!
//! Configures the Axum router with all quotes proxy endpoints.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    get_quote_handler, health_handler, list_quotes_handler, random_quote_handler, stats_handler,
    AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Static `/quotes/random` takes precedence over `/quotes/:id`
    Router::new()
        .route("/quotes", get(list_quotes_handler))
        .route("/quotes/random", get(random_quote_handler))
        .route("/quotes/:id", get(get_quote_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
