//! # Server Lifecycle
//!
//! Serving and the shutdown sequence. [`run`] serves until the supplied
//! future resolves, then:
//!
//! 1. stops accepting connections,
//! 2. drains in-flight requests for at most the configured shutdown timeout
//!    and aborts the server task after it,
//! 3. closes the cache, then the store, then flushes the log router.
//!
//! The binary passes [`shutdown_signal`]; tests pass a oneshot receiver.

use std::future::Future;
use std::net::SocketAddr;

use carfleet_telemetry::TelemetryError;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinError;

use crate::config::ConfigError;
use crate::state::AppState;
use crate::store::StoreError;

/// Failure while serving.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The listener failed.
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    /// The server task panicked or was cancelled.
    #[error("server task failed: {0}")]
    Task(#[from] JoinError),
}

/// Fatal startup failure. The binary logs it and exits with status 1.
#[derive(Error, Debug)]
pub enum StartupError {
    /// Configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Log directory.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// Initial store connection.
    #[error("database connection failed: {0}")]
    Store(#[from] StoreError),

    /// Port binding.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that could not be bound.
        addr: SocketAddr,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Serving failed after startup.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// How the server stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every in-flight request finished within the timeout.
    Drained,
    /// The drain timed out and the server task was aborted.
    Forced,
    /// The server stopped on its own before any shutdown signal.
    Stopped,
}

/// Serve `state` on `listener` until `shutdown` resolves, then run the
/// shutdown sequence.
pub async fn run<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
) -> Result<ShutdownOutcome, LifecycleError>
where
    F: Future<Output = ()> + Send,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let app = crate::app(state.clone());
    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
        })
        .await
    });

    let outcome = tokio::select! {
        joined = &mut server => {
            joined??;
            ShutdownOutcome::Stopped
        }
        () = shutdown => {
            state.log.info("Closing HTTP server gracefully", json!({}));
            let _ = stop_tx.send(true);
            match tokio::time::timeout(state.config.shutdown_timeout, &mut server).await {
                Ok(joined) => {
                    joined??;
                    state.log.info("HTTP server closed", json!({}));
                    ShutdownOutcome::Drained
                }
                Err(_) => {
                    state.log.error(
                        "Forcing shutdown after timeout",
                        json!({ "timeout_secs": state.config.shutdown_timeout.as_secs() }),
                    );
                    server.abort();
                    ShutdownOutcome::Forced
                }
            }
        }
    };

    close_collaborators(&state).await;
    Ok(outcome)
}

/// Close the cache, then the store, then flush the log router.
pub async fn close_collaborators(state: &AppState) {
    if let Some(cache) = &state.cache {
        cache.close().await;
        state.log.info("Redis connection closed", json!({}));
    }
    state.store.close().await;
    state.log.info("Database connection closed", json!({}));
    state.log.close();
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("SIGINT received"),
        () = terminate => tracing::info!("SIGTERM received"),
    }
}
