//! Cache Statistics Module
//!
//! Best-effort statistics parsed from the store's `INFO` text, with the key
//! count taken from `DBSIZE` of the selected database.

use serde::Serialize;

/// Placeholder used when memory usage cannot be read.
pub const UNKNOWN_MEMORY: &str = "unknown";

// == Cache Stats ==
/// Store-wide cache metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Keys in the selected logical database
    pub keys: u64,
    /// Human-readable memory usage reported by the store
    pub memory: String,
    /// Lookups that found a key
    pub hits: u64,
    /// Lookups for a missing key
    pub misses: u64,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self {
            keys: 0,
            memory: UNKNOWN_MEMORY.to_string(),
            hits: 0,
            misses: 0,
        }
    }
}

impl CacheStats {
    // == Parse ==
    /// Parses Redis `INFO` output and records `keys` as the key count.
    ///
    /// `INFO` reports every logical database of the server, so the key count
    /// is supplied by the caller instead of read from the keyspace section.
    /// Other fields are read independently; anything missing or malformed
    /// keeps its default.
    pub fn from_info(info: &str, keys: u64) -> Self {
        let mut stats = Self {
            keys,
            ..Self::default()
        };

        for line in info.lines().map(str::trim) {
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            match field {
                "used_memory_human" if !value.is_empty() => stats.memory = value.to_string(),
                "keyspace_hits" => stats.hits = value.parse().unwrap_or(0),
                "keyspace_misses" => stats.misses = value.parse().unwrap_or(0),
                _ => {}
            }
        }

        stats
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
