//! Error types for the cache and rate limiter
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Store Error Enum ==
/// Failure reported by a key-value store backend.
///
/// These never reach HTTP clients: CacheService and RateLimiter log them and
/// degrade to a safe default.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport or command error from Redis
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Counter command issued against a value that is not an integer
    #[error("Value at '{0}' is not an integer")]
    NotAnInteger(String),

    /// Counter would leave the i64 range
    #[error("Increment on '{0}' would overflow")]
    Overflow(String),

    /// Backend cannot be reached, reported by custom store implementations
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

// == Policy Error Enum ==
/// Rejected rate limit configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Rate limit window must be greater than zero")]
    ZeroWindow,

    #[error("Rate limit max requests must be greater than zero")]
    ZeroMaxRequests,
}

// == API Error Enum ==
/// Errors surfaced by the admin HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Write did not reach the store
    #[error("Store write failed: {0}")]
    StoreWrite(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::StoreWrite(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Result Type Aliases ==
/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type for HTTP handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError::NotFound("k".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_store_write_maps_to_503() {
        let response = ApiError::StoreWrite("k".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_policy_error_messages() {
        assert!(PolicyError::ZeroWindow.to_string().contains("window"));
        assert!(PolicyError::ZeroMaxRequests.to_string().contains("max requests"));
    }
}
