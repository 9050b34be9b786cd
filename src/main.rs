//! Timekeep Cache - shared caching and rate limiting for the timekeep API
//!
//! Serves the cache and rate limit admin API on top of Redis or an in-memory
//! store.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::{signal, task::JoinHandle};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timekeep_cache::{
    api::create_router, config::StoreBackend, spawn_cleanup_task, AppState, Config,
    KeyValueStore, MemoryStore, RedisStore,
};

/// Main entry point for the cache and rate limit service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Connect and ping the configured store
/// 4. Build the cache service and rate limiter on that store
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timekeep_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Timekeep Cache service");

    let config = Config::from_env();
    info!(
        "Configuration loaded: backend={:?}, default_ttl={}s, port={}, rate_limit={} per {}ms",
        config.backend,
        config.default_ttl,
        config.server_port,
        config.rate_limit_max_requests,
        config.rate_limit_window_ms
    );

    let (store, cleanup_handle) = open_store(&config).await?;

    let state = AppState::from_config(store, &config).context("invalid rate limit policy")?;
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cleanup_handle))
    .await
    .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Opens the store selected by `CACHE_BACKEND`. The returned handle belongs to
/// the in-memory sweeper, if one was started.
///
/// A Redis backend that cannot be reached at boot stops startup; outages after
/// that are absorbed by the connection manager and the per-call degrade policy.
async fn open_store(
    config: &Config,
) -> anyhow::Result<(Arc<dyn KeyValueStore>, Option<JoinHandle<()>>)> {
    match config.backend {
        StoreBackend::Redis => {
            let redis = RedisStore::connect(config)
                .await
                .with_context(|| {
                    format!(
                        "failed to connect to Redis at {}:{}",
                        config.redis_host, config.redis_port
                    )
                })?;
            Ok((Arc::new(redis), None))
        }
        StoreBackend::Memory => {
            let memory = MemoryStore::new();
            let cleanup_handle = spawn_cleanup_task(memory.clone(), config.cleanup_interval);
            warn!("In-memory store selected: cache and rate limits are local to this instance");
            Ok((Arc::new(memory), Some(cleanup_handle)))
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the cleanup task and allows graceful shutdown.
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
}
