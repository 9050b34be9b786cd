//! Rate Limit Module
//!
//! Fixed-window request limiting on top of the shared key-value store.
//!
//! Counters live under `ratelimit:<key>`, where the key comes from the
//! policy's [`KeyStrategy`]. Store failures never block traffic.

pub mod client;
mod limiter;
mod middleware;
mod policy;

// Re-export public types
pub use client::{client_ip, AuthenticatedUser, ClientIp, UNKNOWN_CLIENT};
pub use limiter::{RateLimitDecision, RateLimitStatus, RateLimiter};
pub use middleware::{
    apply_headers, rate_limit, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
};
pub use policy::{
    KeyGenerator, KeyStrategy, RateLimitPolicy, RateLimitPolicyBuilder, SkipPredicate,
    DEFAULT_MESSAGE,
};
