//! # carfleet-api — Binary Entry Point
//!
//! Loads configuration, opens the log router, connects the store and the
//! cache, and serves until SIGINT or SIGTERM. Exits with status 1 when
//! startup fails or the shutdown drain times out.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use carfleet_api::cache::RedisCache;
use carfleet_api::config::AppConfig;
use carfleet_api::lifecycle::{self, ShutdownOutcome, StartupError};
use carfleet_api::middleware::error_log;
use carfleet_api::state::AppState;
use carfleet_api::store::PgStore;
use carfleet_telemetry::{LogRouter, RouterLayer};
use serde_json::json;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> ExitCode {
    match start().await {
        Ok(ShutdownOutcome::Forced) => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            if tracing::dispatcher::has_been_set() {
                tracing::error!("Failed to start server: {e}");
            } else {
                eprintln!("Failed to start server: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn start() -> Result<ShutdownOutcome, StartupError> {
    let config = AppConfig::from_env()?;
    let log = Arc::new(LogRouter::open(&config.router_config())?);

    // Ambient `tracing` events flow into the same router as pipeline records.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(RouterLayer::new(Arc::clone(&log)))
        .init();
    install_panic_hook();

    let result = serve(config, Arc::clone(&log)).await;
    if result.is_err() {
        log.close();
    }
    result
}

async fn serve(config: AppConfig, log: Arc<LogRouter>) -> Result<ShutdownOutcome, StartupError> {
    let store = PgStore::connect(&config.database_url).await.map_err(|e| {
        tracing::error!("Database connection failed: {e}");
        e
    })?;
    log.info("Database connected", json!({}));

    let cache = match RedisCache::connect(&config.redis_url).await {
        Ok(cache) => {
            log.info("Redis Connected Successfully", json!({}));
            Some(cache)
        }
        Err(e) => {
            log.error("Error while connecting to redis", json!({ "error": e.to_string() }));
            None
        }
    };

    let port = config.port;
    let environment = config.environment;
    let log_dir = config.log_dir.clone();
    let mut state = AppState::new(config, Arc::clone(&log), Arc::new(store));
    if let Some(cache) = cache {
        state = state.with_cache(Arc::new(cache));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;

    log.info(format!("CarFleet Server running on port {port}"), json!({}));
    log.info(format!("Environment: {environment}"), json!({}));
    log.info(
        format!("Health check: http://localhost:{port}/health"),
        json!({ "logs_directory": log_dir.display().to_string() }),
    );

    let outcome = lifecycle::run(listener, state, lifecycle::shutdown_signal()).await?;
    Ok(outcome)
}

/// Log panics through the router before the default hook prints them.
/// Panics inside a request are logged by the error handler instead.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if error_log::in_request() {
            default_hook(info);
            return;
        }
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        tracing::error!(location = %location, "Panic: {info}");
        default_hook(info);
    }));
}
