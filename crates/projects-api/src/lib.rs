//! Projects API
//!
//! HTTP front end for the project registry: CRUD over `/projects`, a route
//! listing at `/`, an optional static file tree under `/data/`, and an
//! optional background worker that keeps the index in step with the
//! per-project hashes.

#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod routes;
pub mod worker;

use config::{ApiConfig, LogLevel};
use handlers::{create_router, AppState};
use projects_domain::BackendError;
use projects_store::RedisBackend;
use routes::default_routes;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;
use worker::ReconcileWorker;

/// API server error
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Store backend could not be set up
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Default filter directives for `level`
pub fn filter_directives(level: LogLevel) -> String {
    format!(
        "projects_api={level},projects_store={level},tower_http={level}",
        level = level
    )
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `level` when set. Calling this twice is harmless.
pub fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(level)));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Start the API HTTP server
///
/// Connects the Redis pool, spawns the reconcile worker when an interval is
/// configured, and serves until Ctrl+C.
pub async fn start_server(config: ApiConfig) -> Result<(), ApiServerError> {
    init_tracing(config.log_level);

    info!("Starting projects API");
    info!("Bind address: {}", config.bind_addr());
    info!(
        "Redis: {}:{} (pool size {})",
        config.redis_host, config.redis_port, config.redis_pool_size
    );

    let backend = RedisBackend::connect(&config.redis_options())?;
    let state = AppState::new(Arc::new(backend), default_routes());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = config.reconcile_interval().map(|interval| {
        let worker = ReconcileWorker::new(Arc::clone(&state.store), interval);
        tokio::spawn(worker.run(shutdown_rx))
    });

    let static_dir = config.serve_data.then(|| config.data_dir.as_path());
    if let Some(dir) = static_dir {
        info!("Serving {} under /data/", dir.display());
    }
    let app = create_router(state, static_dir);

    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Projects API listening on {}", config.bind_addr());

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx.clone()))
        .await;

    // Stop the worker however serving ended
    let _ = shutdown_tx.send(true);
    if let Some(handle) = worker {
        if let Err(e) = handle.await {
            tracing::error!("Reconcile worker panicked: {}", e);
        }
    }

    served.map_err(|e| ApiServerError::Server(e.to_string()))?;
    info!("Projects API stopped");
    Ok(())
}

/// Resolves on Ctrl+C and tells every `shutdown` subscriber
async fn shutdown_signal(shutdown: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    let _ = shutdown.send(true);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        let directives = filter_directives(LogLevel::Debug);
        assert!(directives.contains("projects_api=debug"));
        assert!(directives.contains("tower_http=debug"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn test_init_tracing_twice() {
        init_tracing(LogLevel::Error);
        init_tracing(LogLevel::Info);
    }
}
