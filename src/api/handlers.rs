//! API Handlers
//!
//! HTTP request handlers for the admin endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;

use crate::cache::{CacheService, Namespace};
use crate::config::Config;
use crate::error::{ApiError, PolicyError, Result};
use crate::models::{
    validate_key, GetEntryResponse, HealthResponse, KeyResponse, PatternQuery, PurgeResponse,
    ResetResponse, SetEntryRequest, StatsResponse,
};
use crate::ratelimit::{RateLimitPolicy, RateLimitStatus, RateLimiter};
use crate::store::KeyValueStore;

/// Application state shared across all handlers.
///
/// The cache and the rate limiter wrap the same store handle.
#[derive(Clone)]
pub struct AppState {
    /// Store handle, used for health checks
    pub store: Arc<dyn KeyValueStore>,
    /// JSON cache facade
    pub cache: Arc<CacheService>,
    /// Limiter guarding the admin routes
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Creates a new AppState from its parts.
    pub fn new(store: Arc<dyn KeyValueStore>, cache: CacheService, limiter: RateLimiter) -> Self {
        Self {
            store,
            cache: Arc::new(cache),
            limiter: Arc::new(limiter),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Fails if the configured rate limit policy is invalid.
    pub fn from_config(
        store: Arc<dyn KeyValueStore>,
        config: &Config,
    ) -> std::result::Result<Self, PolicyError> {
        let policy = RateLimitPolicy::from_config(config)?;
        let cache = CacheService::from_config(store.clone(), config);
        let limiter = RateLimiter::new(store.clone(), policy);
        Ok(Self::new(store, cache, limiter))
    }
}

/// Handler for PUT /cache
///
/// Stores a JSON value with optional TTL.
pub async fn set_entry_handler(
    State(state): State<AppState>,
    Json(req): Json<SetEntryRequest>,
) -> Result<Json<KeyResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    if !state.cache.set(&req.key, &req.value, req.ttl).await {
        return Err(ApiError::StoreWrite(req.key));
    }

    Ok(Json(KeyResponse::set(req.key)))
}

/// Handler for GET /cache/:key
pub async fn get_entry_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetEntryResponse>> {
    let value: Value = state
        .cache
        .get(&key)
        .await
        .ok_or_else(|| ApiError::NotFound(key.clone()))?;
    let ttl = state.cache.ttl(&key).await;

    Ok(Json(GetEntryResponse::new(key, value, ttl)))
}

/// Handler for DELETE /cache/:key
pub async fn delete_entry_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<KeyResponse>> {
    if let Some(error_msg) = validate_key(&key) {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    if !state.cache.delete(&key).await {
        return Err(ApiError::NotFound(key));
    }

    Ok(Json(KeyResponse::deleted(key)))
}

/// Handler for DELETE /cache?pattern=<glob>
pub async fn purge_pattern_handler(
    State(state): State<AppState>,
    Query(query): Query<PatternQuery>,
) -> Result<Json<PurgeResponse>> {
    if let Some(error_msg) = query.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let deleted = state.cache.delete_pattern(&query.pattern).await;
    Ok(Json(PurgeResponse {
        pattern: query.pattern,
        deleted,
    }))
}

/// Handler for DELETE /cache/namespace/:name
///
/// Purges every key under a known namespace such as `chat:typing`.
pub async fn purge_namespace_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PurgeResponse>> {
    let namespace: Namespace = name.parse().map_err(ApiError::InvalidRequest)?;
    let pattern = namespace.pattern();

    let deleted = state.cache.delete_pattern(&pattern).await;
    Ok(Json(PurgeResponse { pattern, deleted }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(state.cache.stats().await))
}

/// Handler for GET /ratelimit/:key
pub async fn rate_limit_status_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<RateLimitStatus> {
    Json(state.limiter.status(&key).await)
}

/// Handler for DELETE /ratelimit/:key
///
/// Lifts a lockout by deleting the key's counter.
pub async fn rate_limit_reset_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ResetResponse>> {
    if !state.limiter.reset(&key).await {
        return Err(ApiError::StoreWrite(key));
    }

    Ok(Json(ResetResponse { key, reset: true }))
}

/// Handler for GET /health
///
/// Always answers 200; reports `degraded` when the store does not respond.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    match state.store.ping().await {
        Ok(()) => Json(HealthResponse::healthy()),
        Err(err) => {
            tracing::warn!("Store health check failed: {}", err);
            Json(HealthResponse::degraded())
        }
    }
}
