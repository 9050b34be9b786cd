//! Rate Limit Middleware
//!
//! Axum middleware applying a [`RateLimiter`] to every request of a router.
//!
//! # Example
//! ```ignore
//! let limiter = Arc::new(RateLimiter::new(store, RateLimitPolicy::api()));
//! let app = Router::new()
//!     .route("/api/time-entries", get(list_entries))
//!     .layer(middleware::from_fn_with_state(limiter, rate_limit));
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, warn};

use crate::models::RateLimitExceededResponse;
use crate::ratelimit::{RateLimitDecision, RateLimiter};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Counts the request and rejects it with 429 once its bucket is over quota.
///
/// Skipped requests pass through untouched. If the store fails, the request
/// is let through exactly as if no limiter were installed.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let policy = limiter.policy();
    if policy.should_skip(&request) {
        return next.run(request).await;
    }

    let key = policy.key_for(&request);
    let decision = match limiter.hit(&key).await {
        Ok(decision) => decision,
        Err(err) => {
            warn!("Rate limiter unavailable for '{}', allowing request: {}", key, err);
            return next.run(request).await;
        }
    };

    let mut response = if decision.allowed() {
        next.run(request).await
    } else {
        debug!(
            "Rate limit exceeded for '{}' ({} of {})",
            key, decision.count, decision.limit
        );
        reject(policy.message(), &decision)
    };

    apply_headers(response.headers_mut(), &decision);
    response
}

fn reject(message: &str, decision: &RateLimitDecision) -> Response {
    let body = RateLimitExceededResponse::new(message, decision.retry_after_secs);
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(decision.retry_after_secs));
    response
}

/// Writes the limit, remaining quota and window reset (epoch ms) headers.
pub fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at_ms));
}
