//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;
use serde_json::Value;

/// Maximum accepted key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Request body for storing a cache entry (PUT /cache)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds (uses the default if not specified, 0 = no expiry)
#[derive(Debug, Clone, Deserialize)]
pub struct SetEntryRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetEntryRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_key(&self.key)
    }
}

/// Query string for pattern deletes (DELETE /cache?pattern=...)
#[derive(Debug, Clone, Deserialize)]
pub struct PatternQuery {
    pub pattern: String,
}

impl PatternQuery {
    /// Rejects empty patterns and the bare `*`, which would wipe the database.
    pub fn validate(&self) -> Option<String> {
        let pattern = self.pattern.trim();
        if pattern.is_empty() {
            return Some("Pattern cannot be empty".to_string());
        }
        if pattern.chars().all(|c| c == '*') {
            return Some("Pattern must not match every key".to_string());
        }
        None
    }
}

/// Shared key validation for path and body keys.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        ));
    }
    None
}
