//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    middleware,
    routing::{delete, get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_entry_handler, get_entry_handler, health_handler, purge_namespace_handler,
    purge_pattern_handler, rate_limit_reset_handler, rate_limit_status_handler,
    set_entry_handler, stats_handler, AppState,
};
use crate::ratelimit::rate_limit;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check (not rate limited)
/// - `GET /stats` - Cache statistics
/// - `PUT /cache` - Store a JSON value
/// - `DELETE /cache?pattern=<glob>` - Delete keys matching a glob
/// - `GET /cache/:key` - Read a value
/// - `DELETE /cache/:key` - Delete a key
/// - `DELETE /cache/namespace/:name` - Purge a known namespace
/// - `GET /ratelimit/:key` - Inspect a rate limit bucket
/// - `DELETE /ratelimit/:key` - Reset a rate limit bucket
///
/// # Middleware
/// - Rate limiting: every route except `/health`
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let limited = Router::new()
        .route("/stats", get(stats_handler))
        .route("/cache", put(set_entry_handler).delete(purge_pattern_handler))
        .route(
            "/cache/:key",
            get(get_entry_handler).delete(delete_entry_handler),
        )
        .route("/cache/namespace/:name", delete(purge_namespace_handler))
        .route(
            "/ratelimit/:key",
            get(rate_limit_status_handler).delete(rate_limit_reset_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(limited)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
