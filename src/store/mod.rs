//! Store Module
//!
//! The key-value store seam shared by the cache service and the rate limiter.
//! Production runs against Redis; the in-memory keyspace mirrors the Redis
//! command semantics for local runs and tests.

mod entry;
mod glob;
mod memory;
mod redis_store;
mod stats;


use async_trait::async_trait;

use crate::error::StoreResult;

// Re-export public types
pub use entry::{current_timestamp_ms, StoredValue};
pub use glob::glob_match;
pub use memory::{Keyspace, MemoryStore};
pub use redis_store::RedisStore;
pub use stats::KeyspaceStats;

// == Public Constants ==
/// `TTL` reply for a key that does not exist
pub const TTL_MISSING: i64 = -2;

/// `TTL` reply for a key without an expiry
pub const TTL_PERSISTENT: i64 = -1;

// == Key Value Store ==
/// Semantic command set used by the cache and the rate limiter.
///
/// Every method maps onto a single Redis command. Implementations must make
/// `incr_by` atomic across concurrent callers; nothing above this trait adds
/// locking of its own.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// `GET key`
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// `SET key value [EX ttl]`; `None` stores without expiry.
    async fn set(&self, key: &str, value: String, ttl_secs: Option<u64>) -> StoreResult<()>;

    /// `DEL key [key ...]`, returning how many keys were removed.
    async fn del(&self, keys: &[String]) -> StoreResult<u64>;

    /// `EXISTS key`
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// `EXPIRE key seconds`, false when the key does not exist.
    async fn expire(&self, key: &str, seconds: i64) -> StoreResult<bool>;

    /// `TTL key`: seconds left, [`TTL_PERSISTENT`] or [`TTL_MISSING`].
    async fn ttl(&self, key: &str) -> StoreResult<i64>;

    /// `INCRBY key delta` (a negative delta is `DECRBY`).
    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64>;

    /// `SCAN cursor MATCH pattern COUNT count`; a returned cursor of 0 ends
    /// the iteration.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize)
        -> StoreResult<(u64, Vec<String>)>;

    /// `FLUSHDB`
    async fn flush_db(&self) -> StoreResult<()>;

    /// `INFO`, in the Redis `field:value` text format.
    async fn info(&self) -> StoreResult<String>;

    /// `DBSIZE`: keys in the selected logical database.
    async fn db_size(&self) -> StoreResult<u64>;

    /// `PING`
    async fn ping(&self) -> StoreResult<()>;
}
