//! # Health Probes
//!
//! - `GET /health`       — store probe with timing, uptime and cache status
//! - `GET /health/ready` — readiness from the store probe only
//! - `GET /health/live`  — liveness, unconditional

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::state::AppState;

/// Assemble the health router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .route("/health/live", get(live))
}

/// Body of a healthy `/health` response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `"healthy"`.
    pub status: String,
    /// ISO-8601 time of the check.
    pub timestamp: String,
    /// Process uptime in seconds.
    pub uptime: f64,
    /// `"connected"`.
    pub database: String,
    /// Probe duration, e.g. `"3ms"`.
    pub response_time: String,
    /// Runtime mode.
    pub environment: String,
    /// `"connected"`, `"disconnected"` or `"not configured"`.
    pub cache: String,
}

/// Body of a failed `/health` response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnhealthyResponse {
    /// `"unhealthy"`.
    pub status: String,
    /// ISO-8601 time of the check.
    pub timestamp: String,
    /// Process uptime in seconds.
    pub uptime: f64,
    /// `"disconnected"`.
    pub database: String,
    /// Probe duration.
    pub response_time: String,
    /// Probe failure.
    pub error: String,
}

/// Body of the readiness and liveness probes.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProbeStatus {
    /// `"ready"`, `"not ready"` or `"alive"`.
    pub status: String,
}

impl ProbeStatus {
    fn new(status: &str) -> Json<Self> {
        Json(Self {
            status: status.to_string(),
        })
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

async fn cache_status(state: &AppState) -> &'static str {
    let Some(cache) = &state.cache else {
        return "not configured";
    };
    match cache.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Cache ping failed");
            "disconnected"
        }
    }
}

/// Full health check.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Store reachable", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = UnhealthyResponse),
    ),
    tag = "health"
)]
async fn health(State(state): State<AppState>) -> Response {
    let start = Instant::now();
    let probe = state.store.ping().await;
    let response_time = format!("{}ms", start.elapsed().as_millis());

    match probe {
        Ok(()) => {
            let body = HealthResponse {
                status: "healthy".to_string(),
                timestamp: now_iso(),
                uptime: state.uptime_secs(),
                database: "connected".to_string(),
                response_time,
                environment: state.environment().as_str().to_string(),
                cache: cache_status(&state).await.to_string(),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            state.log.error(
                "Health check failed",
                json!({ "error": e.to_string(), "response_time": response_time }),
            );
            let body = UnhealthyResponse {
                status: "unhealthy".to_string(),
                timestamp: now_iso(),
                uptime: state.uptime_secs(),
                database: "disconnected".to_string(),
                response_time,
                error: e.to_string(),
            };
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}

/// Readiness probe.
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Ready", body = ProbeStatus),
        (status = 503, description = "Not ready", body = ProbeStatus),
    ),
    tag = "health"
)]
async fn ready(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, ProbeStatus::new("ready")).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, ProbeStatus::new("not ready")).into_response()
        }
    }
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health/live",
    responses((status = 200, description = "Process is running", body = ProbeStatus)),
    tag = "health"
)]
async fn live() -> Json<ProbeStatus> {
    ProbeStatus::new("alive")
}
