//! `GET /` — service name, version and runtime mode.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

/// Assemble the info router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(info))
}

/// Service identification.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    pub message: String,
    pub version: String,
    pub environment: String,
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service identification", body = ServiceInfo)),
    tag = "info"
)]
async fn info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "CarFleet API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.environment().as_str().to_string(),
    })
}
