//! Keyspace Statistics Module
//!
//! Tracks lookup hits and misses for the in-memory keyspace, reported through
//! `INFO` the same way Redis reports `keyspace_hits` / `keyspace_misses`.

// == Keyspace Stats ==
/// Lookup counters for the in-memory keyspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyspaceStats {
    /// Lookups that found a live key
    pub hits: u64,
    /// Lookups for a missing or expired key
    pub misses: u64,
}

impl KeyspaceStats {
    /// Creates a new KeyspaceStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the hit counter.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Increments the miss counter.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }
}
