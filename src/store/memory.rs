//! In-Memory Store Module
//!
//! A process-local keyspace that follows Redis command semantics closely
//! enough for the cache service and the rate limiter to run without a server.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::store::{
    glob_match, KeyValueStore, KeyspaceStats, StoredValue, TTL_MISSING, TTL_PERSISTENT,
};

// == Keyspace ==
/// Key-value storage with lazy and swept TTL expiration.
#[derive(Debug, Default)]
pub struct Keyspace {
    /// Key-value storage, ordered so SCAN can walk it without sorting
    entries: BTreeMap<String, StoredValue>,
    /// Lookup statistics
    stats: KeyspaceStats,
}

impl Keyspace {
    // == Constructor ==
    /// Creates an empty keyspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops `key` if its TTL has elapsed so callers only ever see live keys.
    fn purge_if_expired(&mut self, key: &str) {
        if self.entries.get(key).is_some_and(StoredValue::is_expired) {
            self.entries.remove(key);
        }
    }

    // == Get ==
    /// Retrieves a live value, recording a hit or a miss.
    pub fn get(&mut self, key: &str) -> Option<String> {
        self.purge_if_expired(key);
        match self.entries.get(key) {
            Some(entry) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Stores a value, replacing any previous value and TTL.
    pub fn set(&mut self, key: String, value: String, ttl_secs: Option<u64>) {
        self.entries.insert(key, StoredValue::new(value, ttl_secs));
    }

    // == Delete ==
    /// Removes the given keys and returns how many live keys were removed.
    pub fn del(&mut self, keys: &[String]) -> u64 {
        keys.iter()
            .filter(|key| {
                self.purge_if_expired(key);
                self.entries.remove(key.as_str()).is_some()
            })
            .count() as u64
    }

    // == Exists ==
    pub fn exists(&mut self, key: &str) -> bool {
        self.purge_if_expired(key);
        self.entries.contains_key(key)
    }

    // == Expire ==
    /// Sets a TTL on an existing key. A non-positive TTL deletes the key.
    pub fn expire(&mut self, key: &str, seconds: i64) -> bool {
        self.purge_if_expired(key);
        if seconds <= 0 {
            return self.entries.remove(key).is_some();
        }
        match self.entries.get_mut(key) {
            Some(entry) => {
                let value = std::mem::take(&mut entry.value);
                *entry = StoredValue::new(value, Some(seconds as u64));
                true
            }
            None => false,
        }
    }

    // == TTL ==
    pub fn ttl(&mut self, key: &str) -> i64 {
        self.purge_if_expired(key);
        match self.entries.get(key) {
            Some(entry) => entry
                .ttl_remaining()
                .map(|secs| secs as i64)
                .unwrap_or(TTL_PERSISTENT),
            None => TTL_MISSING,
        }
    }

    // == Increment ==
    /// Adds `delta` to an integer value, creating it at zero if missing.
    ///
    /// The key's TTL is left untouched, matching `INCRBY`.
    pub fn incr_by(&mut self, key: &str, delta: i64) -> StoreResult<i64> {
        self.purge_if_expired(key);
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| StoredValue::new("0".to_string(), None));

        let current: i64 = entry
            .value
            .parse()
            .map_err(|_| StoreError::NotAnInteger(key.to_string()))?;
        let next = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::Overflow(key.to_string()))?;

        entry.value = next.to_string();
        Ok(next)
    }

    // == Scan ==
    /// Walks the keyspace in key order, `count` keys per call.
    ///
    /// The cursor is an offset into the ordered key set; 0 starts and ends the
    /// iteration. Resuming costs a walk up to the offset, so a full scan is
    /// quadratic in the number of keys divided by `count`. Keys removed behind
    /// the cursor while a scan is in progress shift later keys back, which can
    /// make the iteration skip live keys; callers that delete what they scan
    /// should collect first and delete afterwards.
    pub fn scan(&self, cursor: u64, pattern: &str, count: usize) -> (u64, Vec<String>) {
        let start = usize::try_from(cursor).unwrap_or(usize::MAX);
        let mut visited = 0;
        let mut batch = Vec::new();

        for (key, entry) in self.entries.iter().skip(start).take(count.max(1)) {
            visited += 1;
            if !entry.is_expired() && glob_match(pattern, key) {
                batch.push(key.clone());
            }
        }

        let end = start.saturating_add(visited);
        let next = if end >= self.entries.len() { 0 } else { end as u64 };
        (next, batch)
    }

    // == Flush ==
    pub fn flush(&mut self) {
        self.entries.clear();
    }

    // == Info ==
    /// Renders the subset of Redis `INFO` output that stats parsing relies on.
    pub fn info(&self) -> String {
        let live: Vec<&StoredValue> = self.entries.values().filter(|e| !e.is_expired()).collect();
        let expires = live.iter().filter(|e| e.expires_at.is_some()).count();
        let used_bytes: usize = self
            .entries
            .iter()
            .map(|(key, entry)| key.len() + entry.value.len())
            .sum();

        let mut info = String::new();
        info.push_str("# Memory\r\n");
        info.push_str(&format!("used_memory:{}\r\n", used_bytes));
        info.push_str(&format!("used_memory_human:{}\r\n", human_bytes(used_bytes)));
        info.push_str("\r\n# Stats\r\n");
        info.push_str(&format!("keyspace_hits:{}\r\n", self.stats.hits));
        info.push_str(&format!("keyspace_misses:{}\r\n", self.stats.misses));
        info.push_str("\r\n# Keyspace\r\n");
        if !live.is_empty() {
            info.push_str(&format!(
                "db0:keys={},expires={},avg_ttl=0\r\n",
                live.len(),
                expires
            ));
        }
        info
    }

    // == Size ==
    /// Live keys, matching `DBSIZE`.
    pub fn db_size(&self) -> u64 {
        self.entries.values().filter(|e| !e.is_expired()).count() as u64
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning how many were removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before - self.entries.len()
    }

    // == Length ==
    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &KeyspaceStats {
        &self.stats
    }
}

/// Formats a byte count the way Redis fills `used_memory_human`.
fn human_bytes(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let bytes = bytes as f64;
    if bytes < KB {
        format!("{}B", bytes)
    } else if bytes < KB * KB {
        format!("{:.2}K", bytes / KB)
    } else if bytes < KB * KB * KB {
        format!("{:.2}M", bytes / (KB * KB))
    } else {
        format!("{:.2}G", bytes / (KB * KB * KB))
    }
}

// == Memory Store ==
/// Shared handle to an in-memory [`Keyspace`].
///
/// Clones share the same keyspace, so one handle can back the cache, the rate
/// limiter and the cleanup task at once.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    keyspace: Arc<RwLock<Keyspace>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweeps expired entries; used by the background cleanup task.
    pub async fn cleanup_expired(&self) -> usize {
        self.keyspace.write().await.cleanup_expired()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.keyspace.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keyspace.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.keyspace.write().await.get(key))
    }

    async fn set(&self, key: &str, value: String, ttl_secs: Option<u64>) -> StoreResult<()> {
        self.keyspace
            .write()
            .await
            .set(key.to_string(), value, ttl_secs);
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> StoreResult<u64> {
        Ok(self.keyspace.write().await.del(keys))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.keyspace.write().await.exists(key))
    }

    async fn expire(&self, key: &str, seconds: i64) -> StoreResult<bool> {
        Ok(self.keyspace.write().await.expire(key, seconds))
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        Ok(self.keyspace.write().await.ttl(key))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        self.keyspace.write().await.incr_by(key, delta)
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> StoreResult<(u64, Vec<String>)> {
        Ok(self.keyspace.read().await.scan(cursor, pattern, count))
    }

    async fn flush_db(&self) -> StoreResult<()> {
        self.keyspace.write().await.flush();
        Ok(())
    }

    async fn info(&self) -> StoreResult<String> {
        Ok(self.keyspace.read().await.info())
    }

    async fn db_size(&self) -> StoreResult<u64> {
        Ok(self.keyspace.read().await.db_size())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_set_and_get() {
        let mut keyspace = Keyspace::new();

        keyspace.set("key1".to_string(), "value1".to_string(), None);

        assert_eq!(keyspace.get("key1").as_deref(), Some("value1"));
        assert_eq!(keyspace.len(), 1);
    }

    #[test]
    fn test_get_missing_records_miss() {
        let mut keyspace = Keyspace::new();

        assert!(keyspace.get("missing").is_none());
        assert_eq!(keyspace.stats().misses, 1);
        assert_eq!(keyspace.stats().hits, 0);
    }

    #[test]
    fn test_set_clears_previous_ttl() {
        let mut keyspace = Keyspace::new();

        keyspace.set("key1".to_string(), "a".to_string(), Some(60));
        keyspace.set("key1".to_string(), "b".to_string(), None);

        assert_eq!(keyspace.ttl("key1"), TTL_PERSISTENT);
    }

    #[test]
    fn test_ttl_replies() {
        let mut keyspace = Keyspace::new();

        keyspace.set("short".to_string(), "v".to_string(), Some(60));
        keyspace.set("forever".to_string(), "v".to_string(), None);

        assert_eq!(keyspace.ttl("short"), 60);
        assert_eq!(keyspace.ttl("forever"), TTL_PERSISTENT);
        assert_eq!(keyspace.ttl("missing"), TTL_MISSING);
    }

    #[test]
    fn test_expiration_hides_key() {
        let mut keyspace = Keyspace::new();

        keyspace.set("key1".to_string(), "value1".to_string(), Some(1));
        assert!(keyspace.exists("key1"));

        sleep(Duration::from_millis(1100));

        assert!(!keyspace.exists("key1"));
        assert!(keyspace.get("key1").is_none());
        assert_eq!(keyspace.ttl("key1"), TTL_MISSING);
    }

    #[test]
    fn test_del_counts_removed_keys() {
        let mut keyspace = Keyspace::new();

        keyspace.set("a".to_string(), "1".to_string(), None);
        keyspace.set("b".to_string(), "2".to_string(), None);

        let removed = keyspace.del(&["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(removed, 2);
        assert!(keyspace.is_empty());
    }

    #[test]
    fn test_expire_existing_and_missing() {
        let mut keyspace = Keyspace::new();

        keyspace.set("key1".to_string(), "v".to_string(), None);

        assert!(keyspace.expire("key1", 30));
        assert_eq!(keyspace.ttl("key1"), 30);
        assert!(!keyspace.expire("missing", 30));
    }

    #[test]
    fn test_expire_non_positive_deletes() {
        let mut keyspace = Keyspace::new();

        keyspace.set("key1".to_string(), "v".to_string(), None);

        assert!(keyspace.expire("key1", 0));
        assert!(!keyspace.exists("key1"));
    }

    #[test]
    fn test_incr_by_creates_and_keeps_ttl() {
        let mut keyspace = Keyspace::new();

        assert_eq!(keyspace.incr_by("counter", 1).unwrap(), 1);
        assert!(keyspace.expire("counter", 60));
        assert_eq!(keyspace.incr_by("counter", 4).unwrap(), 5);
        assert_eq!(keyspace.incr_by("counter", -2).unwrap(), 3);
        assert_eq!(keyspace.ttl("counter"), 60);
    }

    #[test]
    fn test_incr_by_rejects_non_integer() {
        let mut keyspace = Keyspace::new();

        keyspace.set("text".to_string(), "\"hello\"".to_string(), None);

        assert!(matches!(
            keyspace.incr_by("text", 1),
            Err(StoreError::NotAnInteger(_))
        ));
    }

    #[test]
    fn test_incr_by_overflow() {
        let mut keyspace = Keyspace::new();

        keyspace.set("big".to_string(), i64::MAX.to_string(), None);

        assert!(matches!(
            keyspace.incr_by("big", 1),
            Err(StoreError::Overflow(_))
        ));
    }

    #[test]
    fn test_scan_walks_all_batches() {
        let mut keyspace = Keyspace::new();
        for i in 0..25 {
            keyspace.set(format!("chat:context:{}", i), "v".to_string(), None);
            keyspace.set(format!("chat:session:{}", i), "v".to_string(), None);
        }

        let mut cursor = 0;
        let mut found = Vec::new();
        loop {
            let (next, batch) = keyspace.scan(cursor, "chat:context:*", 10);
            found.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        assert_eq!(found.len(), 25);
        assert!(found.iter().all(|key| key.starts_with("chat:context:")));
    }

    #[test]
    fn test_scan_returns_keys_in_order_and_ends() {
        let mut keyspace = Keyspace::new();
        for key in ["c", "a", "b", "d"] {
            keyspace.set(key.to_string(), "v".to_string(), None);
        }

        assert_eq!(keyspace.scan(0, "*", 3), (3, vec!["a".into(), "b".into(), "c".into()]));
        assert_eq!(keyspace.scan(3, "*", 3), (0, vec!["d".to_string()]));
        assert_eq!(keyspace.scan(99, "*", 3), (0, Vec::<String>::new()));
    }

    #[test]
    fn test_db_size_counts_live_keys() {
        let mut keyspace = Keyspace::new();
        keyspace.set("live".to_string(), "1".to_string(), None);
        keyspace.set("gone".to_string(), "1".to_string(), Some(1));

        assert_eq!(keyspace.db_size(), 2);
        sleep(Duration::from_millis(1100));
        assert_eq!(keyspace.db_size(), 1);
    }

    #[test]
    fn test_info_reports_counts() {
        let mut keyspace = Keyspace::new();

        keyspace.set("a".to_string(), "1".to_string(), Some(60));
        keyspace.set("b".to_string(), "2".to_string(), None);
        keyspace.get("a");
        keyspace.get("missing");

        let info = keyspace.info();
        assert!(info.contains("keyspace_hits:1\r\n"));
        assert!(info.contains("keyspace_misses:1\r\n"));
        assert!(info.contains("db0:keys=2,expires=1"));
        assert!(info.contains("used_memory_human:4B"));
    }

    #[test]
    fn test_cleanup_expired() {
        let mut keyspace = Keyspace::new();

        keyspace.set("key1".to_string(), "value1".to_string(), Some(1));
        keyspace.set("key2".to_string(), "value2".to_string(), Some(10));

        sleep(Duration::from_millis(1100));

        assert_eq!(keyspace.cleanup_expired(), 1);
        assert_eq!(keyspace.len(), 1);
        assert!(keyspace.get("key2").is_some());
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512B");
        assert_eq!(human_bytes(2048), "2.00K");
        assert_eq!(human_bytes(3 * 1024 * 1024), "3.00M");
    }

    #[tokio::test]
    async fn test_memory_store_clones_share_keyspace() {
        let store = MemoryStore::new();
        let other = store.clone();

        store.set("shared", "1".to_string(), None).await.unwrap();

        assert_eq!(other.get("shared").await.unwrap().as_deref(), Some("1"));
        assert_eq!(other.len().await, 1);
    }
}
