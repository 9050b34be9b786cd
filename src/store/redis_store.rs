//! Redis Store Module
//!
//! [`KeyValueStore`] backed by a Redis server through a reconnecting
//! connection manager.

use std::time::Duration;

use async_trait::async_trait;
use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client,
};
use tracing::info;

use crate::config::Config;
use crate::error::StoreResult;
use crate::store::KeyValueStore;

/// Upper bound on establishing a single TCP connection to Redis.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(2);

// == Redis Store ==
/// Redis-backed store.
///
/// The connection manager multiplexes commands over one connection and
/// reconnects on transport failure with bounded retries; commands issued while
/// it is down fail fast and are handled by the caller's degrade policy.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Opens the connection described by `config` and checks it with `PING`.
    ///
    /// Owned by the process entry point; dropping the last clone closes it.
    pub async fn connect(config: &Config) -> StoreResult<Self> {
        let manager_config = ConnectionManagerConfig::new()
            .set_number_of_retries(config.redis_max_retries)
            .set_connection_timeout(CONNECTION_TIMEOUT);

        let client = Client::open(config.redis_connection_info())?;
        let conn = client
            .get_connection_manager_with_config(manager_config)
            .await?;

        let store = Self { conn };
        store.ping().await?;

        info!(
            "Connected to Redis at {}:{} (db {})",
            config.redis_host, config.redis_port, config.redis_db
        );
        Ok(store)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl_secs: Option<u64>) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        match ttl_secs {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let found: bool = conn.exists(key).await?;
        Ok(found)
    }

    async fn expire(&self, key: &str, seconds: i64) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let applied: bool = conn.expire(key, seconds).await?;
        Ok(applied)
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        let remaining: i64 = conn.ttl(key).await?;
        Ok(remaining)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(key, delta).await?;
        Ok(value)
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> StoreResult<(u64, Vec<String>)> {
        let mut conn = self.conn.clone();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok((next, keys))
    }

    async fn flush_db(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }

    async fn info(&self) -> StoreResult<String> {
        let mut conn = self.conn.clone();
        let text: String = redis::cmd("INFO").query_async(&mut conn).await?;
        Ok(text)
    }

    async fn db_size(&self) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        let keys: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;
        Ok(keys)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_to_unreachable_server_fails() {
        let config = Config {
            redis_host: "127.0.0.1".to_string(),
            redis_port: 1,
            redis_max_retries: 0,
            ..Config::default()
        };

        assert!(RedisStore::connect(&config).await.is_err());
    }
}
