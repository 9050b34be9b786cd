//! API Module
//!
//! HTTP handlers and routing for the cache and rate limit admin API.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache statistics
//! - `PUT /cache`, `GET|DELETE /cache/:key` - Cache entries
//! - `DELETE /cache?pattern=`, `DELETE /cache/namespace/:name` - Purges
//! - `GET|DELETE /ratelimit/:key` - Rate limit status and reset

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
