//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;

use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

// == Store Backend ==
/// Which key-value store backs the cache and the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Shared Redis server (production)
    Redis,
    /// Process-local keyspace (local runs and tests)
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store implementation to use
    pub backend: StoreBackend,
    /// Redis host name
    pub redis_host: String,
    /// Redis port
    pub redis_port: u16,
    /// Optional Redis password
    pub redis_password: Option<String>,
    /// Redis logical database index
    pub redis_db: i64,
    /// Reconnect attempts made by the Redis connection manager
    pub redis_max_retries: usize,
    /// Default TTL in seconds for cache entries without explicit TTL (0 = never expire)
    pub default_ttl: u64,
    /// Keys requested per SCAN round trip
    pub scan_count: usize,
    /// HTTP server port
    pub server_port: u16,
    /// Expiry sweep interval in seconds for the in-memory backend
    pub cleanup_interval: u64,
    /// Rate limit window in milliseconds
    pub rate_limit_window_ms: u64,
    /// Requests allowed per window
    pub rate_limit_max_requests: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `redis` or `memory` (default: redis)
    /// - `REDIS_HOST` - Redis host (default: localhost)
    /// - `REDIS_PORT` - Redis port (default: 6379)
    /// - `REDIS_PASSWORD` - Redis password (default: none)
    /// - `REDIS_DB` - Redis database index (default: 0)
    /// - `REDIS_MAX_RETRIES` - Reconnect attempts (default: 3)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 3600)
    /// - `CACHE_SCAN_COUNT` - SCAN batch size (default: 100)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - In-memory sweep frequency in seconds (default: 1)
    /// - `RATE_LIMIT_WINDOW_MS` - Window length (default: 900000)
    /// - `RATE_LIMIT_MAX_REQUESTS` - Requests per window (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            backend: parse_var("CACHE_BACKEND").unwrap_or(defaults.backend),
            redis_host: env::var("REDIS_HOST")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.redis_host),
            redis_port: parse_var("REDIS_PORT").unwrap_or(defaults.redis_port),
            redis_password: env::var("REDIS_PASSWORD")
                .ok()
                .filter(|v| !v.is_empty()),
            redis_db: parse_var("REDIS_DB").unwrap_or(defaults.redis_db),
            redis_max_retries: parse_var("REDIS_MAX_RETRIES")
                .unwrap_or(defaults.redis_max_retries),
            default_ttl: parse_var("CACHE_DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            scan_count: parse_var("CACHE_SCAN_COUNT")
                .filter(|count: &usize| *count > 0)
                .unwrap_or(defaults.scan_count),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL")
                .unwrap_or(defaults.cleanup_interval),
            rate_limit_window_ms: parse_var("RATE_LIMIT_WINDOW_MS")
                .unwrap_or(defaults.rate_limit_window_ms),
            rate_limit_max_requests: parse_var("RATE_LIMIT_MAX_REQUESTS")
                .unwrap_or(defaults.rate_limit_max_requests),
        }
    }

    /// Connection parameters for the Redis client.
    ///
    /// Built field by field so a password is passed through verbatim, whatever
    /// characters it contains.
    pub fn redis_connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.redis_host.clone(), self.redis_port),
            redis: RedisConnectionInfo {
                db: self.redis_db,
                password: self.redis_password.clone(),
                ..RedisConnectionInfo::default()
            },
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_password: None,
            redis_db: 0,
            redis_max_retries: 3,
            default_ttl: 3600,
            scan_count: 100,
            server_port: 3000,
            cleanup_interval: 1,
            rate_limit_window_ms: 15 * 60 * 1000,
            rate_limit_max_requests: 100,
        }
    }
}
