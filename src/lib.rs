//! Timekeep Cache - shared caching and rate limiting for the timekeep API
//!
//! A failure-tolerant JSON cache and a fixed-window rate limiter, both built on
//! one injected key-value store (Redis in production, in-memory for local runs).

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod ratelimit;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::CacheService;
pub use config::Config;
pub use ratelimit::{RateLimitPolicy, RateLimiter};
pub use store::{KeyValueStore, MemoryStore, RedisStore};
pub use tasks::spawn_cleanup_task;
