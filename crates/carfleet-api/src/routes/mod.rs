//! # API Route Modules
//!
//! - `info` — service identification at `/`.
//! - `health` — store-backed health, readiness and liveness probes.
//! - `users` — user creation stub.
//!
//! Unmatched paths fall through to [`not_found`].

pub mod health;
pub mod info;
pub mod users;

use axum::http::Uri;
use axum::Router;

use crate::error::ApiError;
use crate::state::AppState;

/// Assemble every route module.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(info::router())
        .merge(health::router())
        .merge(users::router())
}

/// Fallback for unmatched routes.
pub async fn not_found(uri: Uri) -> ApiError {
    let url = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
    ApiError::not_found(format!("Route {url} not found"))
}
