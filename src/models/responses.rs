//! Response DTOs for the admin API and the rate limiter
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;

/// Response body for reading an entry (GET /cache/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetEntryResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: Value,
    /// Remaining TTL in seconds (-1 = no expiry)
    pub ttl: i64,
}

impl GetEntryResponse {
    pub fn new(key: impl Into<String>, value: Value, ttl: i64) -> Self {
        Self {
            key: key.into(),
            value,
            ttl,
        }
    }
}

/// Response body for key mutations (PUT /cache, DELETE /cache/:key)
#[derive(Debug, Clone, Serialize)]
pub struct KeyResponse {
    /// Success message
    pub message: String,
    /// The key that was affected
    pub key: String,
}

impl KeyResponse {
    pub fn set(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }

    pub fn deleted(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for pattern and namespace purges
#[derive(Debug, Clone, Serialize)]
pub struct PurgeResponse {
    /// Glob that was purged
    pub pattern: String,
    /// Number of keys removed
    pub deleted: u64,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(stats: CacheStats) -> Self {
        let hit_rate = stats.hit_rate();
        Self { stats, hit_rate }
    }
}

/// Response body for rate limit resets (DELETE /ratelimit/:key)
#[derive(Debug, Clone, Serialize)]
pub struct ResetResponse {
    pub key: String,
    pub reset: bool,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the store does not answer
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self::with_status("healthy")
    }

    pub fn degraded() -> Self {
        Self::with_status("degraded")
    }

    fn with_status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Body of a 429 response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitExceededResponse {
    /// Always `error`
    pub status: String,
    pub message: String,
    /// Seconds until the window resets
    pub retry_after: u64,
}

impl RateLimitExceededResponse {
    pub fn new(message: impl Into<String>, retry_after: u64) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            retry_after,
        }
    }
}
