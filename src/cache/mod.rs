//! Cache Module
//!
//! Failure-tolerant JSON caching on top of the shared key-value store.

pub mod keys;
mod service;
mod stats;

// Re-export public types
pub use keys::Namespace;
pub use service::CacheService;
pub use stats::CacheStats;
