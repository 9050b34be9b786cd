//! Cache Service Module
//!
//! JSON cache facade over a [`KeyValueStore`].
//!
//! The cache is an accelerator, never a source of truth: every operation
//! catches its own store errors, logs them and returns a miss-shaped default,
//! so an unreachable store costs latency but never fails a request. Counter
//! operations are the exception and hand the error back, since a zero count
//! and a failed increment must stay distinguishable.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::cache::CacheStats;
use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::store::{KeyValueStore, TTL_PERSISTENT};

/// Slot shared by concurrent `get_or_set` callers missing on the same key.
type Flight = Arc<OnceCell<Option<String>>>;

// == Cache Service ==
pub struct CacheService {
    /// Backing store, shared with the rate limiter
    store: Arc<dyn KeyValueStore>,
    /// TTL applied when `set` is called without one (0 = no expiry)
    default_ttl: u64,
    /// Keys requested per SCAN round trip
    scan_count: usize,
    /// In-progress `get_or_set` factory runs, by key
    in_flight: DashMap<String, Flight>,
}

impl CacheService {
    // == Constructor ==
    /// Creates a cache service over `store`.
    ///
    /// # Arguments
    /// * `store` - The key-value store to wrap
    /// * `default_ttl` - TTL in seconds for writes without one; 0 disables expiry
    /// * `scan_count` - SCAN batch size used by pattern deletes
    pub fn new(store: Arc<dyn KeyValueStore>, default_ttl: u64, scan_count: usize) -> Self {
        Self {
            store,
            default_ttl,
            scan_count: scan_count.max(1),
            in_flight: DashMap::new(),
        }
    }

    /// Creates a cache service using the TTL and SCAN settings from `config`.
    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &Config) -> Self {
        Self::new(store, config.default_ttl, config.scan_count)
    }

    // == Get ==
    /// Returns the decoded value, or `None` on a miss, a store error or a
    /// value that does not decode as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!("Cache get failed for '{}': {}", key, err);
                return None;
            }
        };
        decode(key, &raw)
    }

    // == Set ==
    /// Stores `value` as JSON.
    ///
    /// `ttl` overrides the default TTL; an effective TTL of 0 stores without
    /// expiry. Returns false if the value could not be written.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Option<u64>) -> bool
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, raw, ttl).await,
            Err(err) => {
                warn!("Cache set failed for '{}': {}", key, err);
                false
            }
        }
    }

    async fn set_raw(&self, key: &str, raw: String, ttl: Option<u64>) -> bool {
        let effective_ttl = ttl.unwrap_or(self.default_ttl);
        let expiry = (effective_ttl > 0).then_some(effective_ttl);

        match self.store.set(key, raw, expiry).await {
            Ok(()) => true,
            Err(err) => {
                warn!("Cache set failed for '{}': {}", key, err);
                false
            }
        }
    }

    // == Delete ==
    /// Removes `key`. Returns true if a key was removed.
    pub async fn delete(&self, key: &str) -> bool {
        match self.store.del(&[key.to_string()]).await {
            Ok(removed) => removed > 0,
            Err(err) => {
                warn!("Cache delete failed for '{}': {}", key, err);
                false
            }
        }
    }

    // == Delete Pattern ==
    /// Removes every key matching the glob `pattern`, returning how many were
    /// removed.
    ///
    /// Keys are gathered with cursor-based SCAN round trips of `scan_count`
    /// keys, then deleted in batches of the same size. If a delete batch
    /// fails, the keys removed before it are still counted.
    pub async fn delete_pattern(&self, pattern: &str) -> u64 {
        let keys = match self.scan_all(pattern).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!("Cache scan failed for pattern '{}': {}", pattern, err);
                return 0;
            }
        };

        let mut deleted = 0;
        for batch in keys.chunks(self.scan_count) {
            match self.store.del(batch).await {
                Ok(removed) => deleted += removed,
                Err(err) => {
                    warn!("Cache delete failed for pattern '{}': {}", pattern, err);
                    break;
                }
            }
        }

        debug!("Deleted {} keys matching '{}'", deleted, pattern);
        deleted
    }

    async fn scan_all(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        let mut cursor = 0;

        loop {
            let (next, batch) = self.store.scan(cursor, pattern, self.scan_count).await?;
            // SCAN may report a key more than once
            keys.extend(batch.into_iter().filter(|key| seen.insert(key.clone())));
            if next == 0 {
                return Ok(keys);
            }
            cursor = next;
        }
    }

    // == Exists ==
    pub async fn exists(&self, key: &str) -> bool {
        self.store.exists(key).await.unwrap_or_else(|err| {
            warn!("Cache exists failed for '{}': {}", key, err);
            false
        })
    }

    // == Expire ==
    /// Sets a TTL on an existing key. Returns false for missing keys and on error.
    pub async fn expire(&self, key: &str, seconds: u64) -> bool {
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        self.store.expire(key, seconds).await.unwrap_or_else(|err| {
            warn!("Cache expire failed for '{}': {}", key, err);
            false
        })
    }

    // == TTL ==
    /// Remaining seconds, -2 for a missing key, -1 for no expiry or on error.
    pub async fn ttl(&self, key: &str) -> i64 {
        self.store.ttl(key).await.unwrap_or_else(|err| {
            warn!("Cache ttl failed for '{}': {}", key, err);
            TTL_PERSISTENT
        })
    }

    // == Counters ==
    /// Atomically adds `by` to the counter at `key`.
    pub async fn increment(&self, key: &str, by: i64) -> StoreResult<i64> {
        self.store.incr_by(key, by).await.map_err(|err| {
            warn!("Cache increment failed for '{}': {}", key, err);
            err
        })
    }

    /// Atomically subtracts `by` from the counter at `key`.
    pub async fn decrement(&self, key: &str, by: i64) -> StoreResult<i64> {
        let delta = by
            .checked_neg()
            .ok_or_else(|| StoreError::Overflow(key.to_string()))?;
        self.store.incr_by(key, delta).await.map_err(|err| {
            warn!("Cache decrement failed for '{}': {}", key, err);
            err
        })
    }

    // == Get Or Set ==
    /// Read-through lookup.
    ///
    /// On a miss, `factory` produces the value, which is cached with `ttl` and
    /// returned. Concurrent misses on the same key share a single factory run;
    /// callers that joined a run drop their own factory unused. A factory error
    /// is logged, nothing is cached and every caller of that run gets `None`.
    /// A failed cache write still returns the produced value. A stored value
    /// that does not decode as `T` counts as a miss and is overwritten.
    pub async fn get_or_set<T, F, Fut, E>(
        &self,
        key: &str,
        factory: F,
        ttl: Option<u64>,
    ) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if let Some(hit) = self.get::<T>(key).await {
            return Some(hit);
        }

        let flight = self.in_flight.entry(key.to_string()).or_default().clone();
        let raw = flight
            .get_or_init(|| async move {
                // a run that finished between our miss and joining has already filled the key
                if let Ok(Some(raw)) = self.store.get(key).await {
                    if decode::<T>(key, &raw).is_some() {
                        return Some(raw);
                    }
                }

                let value = match factory().await {
                    Ok(value) => value,
                    Err(err) => {
                        warn!("Cache factory failed for '{}': {}", key, err);
                        return None;
                    }
                };
                let raw = match serde_json::to_string(&value) {
                    Ok(raw) => raw,
                    Err(err) => {
                        warn!("Cache set failed for '{}': {}", key, err);
                        return None;
                    }
                };
                self.set_raw(key, raw.clone(), ttl).await;
                Some(raw)
            })
            .await
            .clone();

        self.in_flight
            .remove_if(key, |_, current| Arc::ptr_eq(current, &flight));

        decode(key, &raw?)
    }

    // == Flush ==
    /// Clears the whole logical database. Administrative and test use only.
    pub async fn flush(&self) -> bool {
        match self.store.flush_db().await {
            Ok(()) => {
                warn!("Cache flushed");
                true
            }
            Err(err) => {
                warn!("Cache flush failed: {}", err);
                false
            }
        }
    }

    // == Stats ==
    /// Store statistics, zeroed when `INFO` is unavailable.
    ///
    /// The key count covers only the database this service writes to.
    pub async fn stats(&self) -> CacheStats {
        let info = match self.store.info().await {
            Ok(info) => info,
            Err(err) => {
                warn!("Cache stats failed: {}", err);
                return CacheStats::default();
            }
        };
        let keys = self.store.db_size().await.unwrap_or_else(|err| {
            warn!("Cache key count failed: {}", err);
            0
        });
        CacheStats::from_info(&info, keys)
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    serde_json::from_str(raw)
        .map_err(|err| warn!("Cache value for '{}' is not valid JSON: {}", key, err))
        .ok()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde::Deserialize;

    use async_trait::async_trait;

    use crate::cache::stats::UNKNOWN_MEMORY;
    use crate::store::MemoryStore;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Context {
        user_id: u64,
        messages: Vec<String>,
    }

    fn service_with_ttl(default_ttl: u64) -> (CacheService, MemoryStore) {
        let store = MemoryStore::new();
        let service = CacheService::new(Arc::new(store.clone()), default_ttl, 10);
        (service, store)
    }

    fn service() -> CacheService {
        service_with_ttl(300).0
    }

    /// Store that fails every command, like a Redis that cannot be reached.
    struct DownStore;

    fn down() -> StoreError {
        StoreError::Unavailable("connection refused".to_string())
    }

    #[async_trait]
    impl KeyValueStore for DownStore {
        async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            Err(down())
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Option<u64>) -> StoreResult<()> {
            Err(down())
        }

        async fn del(&self, _keys: &[String]) -> StoreResult<u64> {
            Err(down())
        }

        async fn exists(&self, _key: &str) -> StoreResult<bool> {
            Err(down())
        }

        async fn expire(&self, _key: &str, _seconds: i64) -> StoreResult<bool> {
            Err(down())
        }

        async fn ttl(&self, _key: &str) -> StoreResult<i64> {
            Err(down())
        }

        async fn incr_by(&self, _key: &str, _delta: i64) -> StoreResult<i64> {
            Err(down())
        }

        async fn scan(
            &self,
            _cursor: u64,
            _pattern: &str,
            _count: usize,
        ) -> StoreResult<(u64, Vec<String>)> {
            Err(down())
        }

        async fn flush_db(&self) -> StoreResult<()> {
            Err(down())
        }

        async fn info(&self) -> StoreResult<String> {
            Err(down())
        }

        async fn db_size(&self) -> StoreResult<u64> {
            Err(down())
        }

        async fn ping(&self) -> StoreResult<()> {
            Err(down())
        }
    }

    fn down_service() -> CacheService {
        CacheService::new(Arc::new(DownStore), 300, 10)
    }

    #[tokio::test]
    async fn test_set_and_get_round_trip() {
        let cache = service();
        let context = Context {
            user_id: 7,
            messages: vec!["log 2h on website".to_string()],
        };

        assert!(cache.set("chat:context:7", &context, Some(60)).await);

        let fetched: Option<Context> = cache.get("chat:context:7").await;
        assert_eq!(fetched, Some(context));
    }

    #[tokio::test]
    async fn test_get_miss_returns_none() {
        let cache = service();
        let fetched: Option<Context> = cache.get("chat:context:missing").await;
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn test_get_corrupt_value_is_a_miss() {
        let (cache, store) = service_with_ttl(300);
        store.set("corrupt", "{not json".to_string(), None).await.unwrap();

        let fetched: Option<Context> = cache.get("corrupt").await;
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn test_get_or_set_replaces_corrupt_value() {
        let (cache, store) = service_with_ttl(300);
        store.set("report", "{not json".to_string(), None).await.unwrap();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_set(
                    "report",
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, String>(42u32)
                    },
                    None,
                )
                .await;
            assert_eq!(value, Some(42));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get("report").await.unwrap().as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_get_or_set_value_of_wrong_shape_is_a_miss() {
        let (cache, store) = service_with_ttl(300);
        store.set("chat:context:9", "\"plain text\"".to_string(), None).await.unwrap();
        let context = Context {
            user_id: 9,
            messages: Vec::new(),
        };

        let value = cache
            .get_or_set(
                "chat:context:9",
                || async { Ok::<_, String>(context.clone()) },
                None,
            )
            .await;

        assert_eq!(value, Some(context.clone()));
        assert_eq!(cache.get::<Context>("chat:context:9").await, Some(context));
    }

    #[tokio::test]
    async fn test_set_uses_default_ttl() {
        let cache = service();
        cache.set("k", &1, None).await;
        assert_eq!(cache.ttl("k").await, 300);
    }

    #[tokio::test]
    async fn test_set_zero_ttl_never_expires() {
        let cache = service();
        cache.set("k", &1, Some(0)).await;
        assert_eq!(cache.ttl("k").await, TTL_PERSISTENT);
    }

    #[tokio::test]
    async fn test_zero_default_ttl_never_expires() {
        let (cache, _) = service_with_ttl(0);
        cache.set("k", &1, None).await;
        assert_eq!(cache.ttl("k").await, TTL_PERSISTENT);
    }

    #[tokio::test]
    async fn test_value_expires_after_ttl() {
        let cache = service();
        cache.set("short", &"lived", Some(1)).await;
        assert_eq!(cache.get::<String>("short").await.as_deref(), Some("lived"));

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(cache.get::<String>("short").await.is_none());
    }

    #[tokio::test]
    async fn test_delete_and_exists() {
        let cache = service();
        cache.set("k", &"v", None).await;

        assert!(cache.exists("k").await);
        assert!(cache.delete("k").await);
        assert!(!cache.exists("k").await);
        assert!(!cache.delete("k").await);
    }

    #[tokio::test]
    async fn test_delete_pattern_spans_scan_batches() {
        let cache = service();
        for i in 0..35 {
            cache.set(&format!("chat:typing:{}", i), &true, None).await;
        }
        cache.set("chat:session:1", &true, None).await;

        assert_eq!(cache.delete_pattern("chat:typing:*").await, 35);
        assert!(cache.exists("chat:session:1").await);
        assert_eq!(cache.delete_pattern("chat:typing:*").await, 0);
    }

    #[tokio::test]
    async fn test_expire_and_ttl() {
        let cache = service();
        cache.set("k", &"v", Some(0)).await;

        assert!(cache.expire("k", 45).await);
        assert_eq!(cache.ttl("k").await, 45);
        assert!(!cache.expire("missing", 45).await);
        assert_eq!(cache.ttl("missing").await, -2);
    }

    #[tokio::test]
    async fn test_increment_and_decrement() {
        let cache = service();

        assert_eq!(cache.increment("hits", 1).await.unwrap(), 1);
        assert_eq!(cache.increment("hits", 5).await.unwrap(), 6);
        assert_eq!(cache.decrement("hits", 6).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_increment_failure_is_distinguishable_from_zero() {
        let cache = service();
        cache.set("text", &"hello", None).await;

        assert!(matches!(
            cache.increment("text", 1).await,
            Err(StoreError::NotAnInteger(_))
        ));
        assert!(matches!(
            cache.decrement("hits", i64::MIN).await,
            Err(StoreError::Overflow(_))
        ));
    }

    #[tokio::test]
    async fn test_get_or_set_populates_on_miss() {
        let cache = service();

        let value = cache
            .get_or_set("report", || async { Ok::<_, String>(42u32) }, Some(60))
            .await;

        assert_eq!(value, Some(42));
        assert_eq!(cache.get::<u32>("report").await, Some(42));
        assert_eq!(cache.ttl("report").await, 60);
    }

    #[tokio::test]
    async fn test_get_or_set_hit_skips_factory() {
        let cache = service();
        cache.set("report", &7u32, None).await;
        let calls = AtomicUsize::new(0);

        let value = cache
            .get_or_set(
                "report",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(99u32)
                },
                None,
            )
            .await;

        assert_eq!(value, Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_get_or_set_factory_error_caches_nothing() {
        let cache = service();

        let value: Option<u32> = cache
            .get_or_set("report", || async { Err("upstream down") }, None)
            .await;

        assert!(value.is_none());
        assert!(!cache.exists("report").await);
    }

    #[tokio::test]
    async fn test_get_or_set_single_flight() {
        let cache = Arc::new(service());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_set(
                        "expensive",
                        || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok::<_, String>("computed".to_string())
                        },
                        None,
                    )
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().as_deref(), Some("computed"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_flush_and_stats() {
        let cache = service();
        cache.set("a", &1, None).await;
        cache.set("b", &2, None).await;
        let _: Option<u32> = cache.get("a").await;
        let _: Option<u32> = cache.get("missing").await;

        let stats = cache.stats().await;
        assert_eq!(stats.keys, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);

        assert!(cache.flush().await);
        assert_eq!(cache.stats().await.keys, 0);
    }

    // == Store Failure ==

    #[tokio::test]
    async fn test_unreachable_store_degrades_reads_and_writes() {
        let cache = down_service();

        assert!(cache.get::<Context>("chat:context:1").await.is_none());
        assert!(!cache.set("chat:context:1", &1, Some(60)).await);
        assert!(!cache.delete("chat:context:1").await);
        assert!(!cache.exists("chat:context:1").await);
        assert!(!cache.expire("chat:context:1", 60).await);
        assert_eq!(cache.ttl("chat:context:1").await, TTL_PERSISTENT);
        assert!(!cache.flush().await);
    }

    #[tokio::test]
    async fn test_unreachable_store_degrades_pattern_delete_and_stats() {
        let cache = down_service();

        assert_eq!(cache.delete_pattern("chat:typing:*").await, 0);

        let stats = cache.stats().await;
        assert_eq!(stats, CacheStats::default());
        assert_eq!(stats.keys, 0);
        assert_eq!(stats.memory, UNKNOWN_MEMORY);
    }

    #[tokio::test]
    async fn test_unreachable_store_counters_report_errors() {
        let cache = down_service();

        assert!(matches!(
            cache.increment("hits", 1).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            cache.decrement("hits", 1).await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_store_get_or_set_returns_factory_value() {
        let cache = down_service();

        let value = cache
            .get_or_set("report", || async { Ok::<_, String>(5u32) }, Some(60))
            .await;

        assert_eq!(value, Some(5));
        assert!(cache.in_flight.is_empty());
    }
}
