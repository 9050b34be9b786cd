//! Fixed-Window Rate Limiter
//!
//! Counts requests per bucket with the store's atomic `INCRBY`. The first hit
//! of a window arms the bucket's TTL and later hits never touch it, so a
//! bucket lives exactly one window from its first request. A burst straddling
//! two windows can therefore see up to twice the quota.
//!
//! `INCRBY` followed by `EXPIRE` is not atomic as a pair. A concurrent hit
//! landing in between only observes a count above 1 and leaves the TTL alone,
//! so the window may start marginally after the first increment.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::Namespace;
use crate::error::StoreResult;
use crate::ratelimit::RateLimitPolicy;
use crate::store::{current_timestamp_ms, KeyValueStore};

// == Decision ==
/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Requests allowed per window
    pub limit: u64,
    /// Requests counted in the current window, including this one
    pub count: u64,
    /// Requests left in the current window
    pub remaining: u64,
    /// When the window ends (Unix milliseconds)
    pub reset_at_ms: u64,
    /// Seconds until the window ends
    pub retry_after_secs: u64,
}

impl RateLimitDecision {
    /// The request at exactly `limit` is the last one allowed.
    pub fn allowed(&self) -> bool {
        self.count <= self.limit
    }
}

// == Status ==
/// Read-only view of a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub key: String,
    pub limit: u64,
    pub count: u64,
    pub remaining: u64,
    pub reset_at: u64,
}

// == Rate Limiter ==
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, policy: RateLimitPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Store key of the counter for `key`.
    pub fn bucket_key(key: &str) -> String {
        Namespace::RateLimit.key(key)
    }

    // == Hit ==
    /// Counts one request against `key`.
    ///
    /// Store errors are returned as-is; the middleware treats them as an
    /// allowed request.
    pub async fn hit(&self, key: &str) -> StoreResult<RateLimitDecision> {
        let bucket = Self::bucket_key(key);
        let window_secs = self.window_secs_i64();

        let count = self.store.incr_by(&bucket, 1).await?;
        if count == 1 {
            self.store.expire(&bucket, window_secs).await?;
        }

        let mut ttl = self.store.ttl(&bucket).await?;
        if ttl < 0 {
            // a counter without expiry would never reset; re-arm the window
            debug!("Re-arming rate limit window for '{}'", bucket);
            self.store.expire(&bucket, window_secs).await?;
            ttl = window_secs;
        }

        let count = count.max(0) as u64;
        let limit = self.policy.max_requests();
        let ttl = ttl as u64;

        Ok(RateLimitDecision {
            limit,
            count,
            remaining: limit.saturating_sub(count),
            reset_at_ms: current_timestamp_ms() + ttl * 1000,
            retry_after_secs: ttl,
        })
    }

    // == Status ==
    /// Current state of `key` without counting a request.
    ///
    /// Reports a full quota if the store cannot be read.
    pub async fn status(&self, key: &str) -> RateLimitStatus {
        let limit = self.policy.max_requests();
        let now = current_timestamp_ms();

        let (count, ttl) = match self.read_bucket(&Self::bucket_key(key)).await {
            Ok(state) => state,
            Err(err) => {
                warn!("Rate limit status unavailable for '{}': {}", key, err);
                (0, -1)
            }
        };

        let reset_at = if ttl > 0 {
            now + ttl as u64 * 1000
        } else {
            now + self.policy.window_ms()
        };

        RateLimitStatus {
            key: key.to_string(),
            limit,
            count,
            remaining: limit.saturating_sub(count),
            reset_at,
        }
    }

    async fn read_bucket(&self, bucket: &str) -> StoreResult<(u64, i64)> {
        let count = self
            .store
            .get(bucket)
            .await?
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(0);
        let ttl = self.store.ttl(bucket).await?;
        Ok((count, ttl))
    }

    // == Reset ==
    /// Deletes the counter for `key`, restoring its full quota.
    ///
    /// Returns false if the store could not be reached.
    pub async fn reset(&self, key: &str) -> bool {
        match self.store.del(&[Self::bucket_key(key)]).await {
            Ok(_) => {
                debug!("Rate limit reset for '{}'", key);
                true
            }
            Err(err) => {
                warn!("Rate limit reset failed for '{}': {}", key, err);
                false
            }
        }
    }

    fn window_secs_i64(&self) -> i64 {
        i64::try_from(self.policy.window_secs()).unwrap_or(i64::MAX)
    }
}
