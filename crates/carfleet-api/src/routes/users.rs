//! # User Routes
//!
//! `POST /api/users` is a stub: it logs the sanitized payload and echoes the
//! username back with a fixed id. Nothing is persisted.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use carfleet_telemetry::{sanitize, REQUEST_SENSITIVE_KEYS};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::extractors::extract_json;
use crate::state::AppState;

/// Assemble the users router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/users", post(create_user))
}

/// Request body accepted by `POST /api/users`. Unknown fields are ignored.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Response to `POST /api/users`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateUserResponse {
    pub id: u64,
    pub username: Option<String>,
    pub message: String,
}

/// Create a user.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = CreateUserResponse),
        (status = 400, description = "Malformed body", body = crate::error::ErrorPayload),
    ),
    tag = "users"
)]
async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateUserResponse>), ApiError> {
    let body = extract_json(body)?;
    state.log.info(
        "Creating new user",
        json!({ "body": sanitize(&body, REQUEST_SENSITIVE_KEYS) }),
    );

    let username = body
        .get("username")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            id: 1,
            username,
            message: "User created successfully".to_string(),
        }),
    ))
}
