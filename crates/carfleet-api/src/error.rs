//! # API Error Types
//!
//! Handlers return `Result<_, ApiError>`. Converting an [`ApiError`] into a
//! response yields a production-safe payload and stashes the error itself in
//! the response extensions as an [`ErrorSlot`]. The centralized
//! [`error_log`](crate::middleware::error_log) middleware picks the slot up,
//! logs the full context once, and rewrites the payload for the runtime mode.
//!
//! Classification:
//!
//! | Error                         | Status | Client message                         |
//! |-------------------------------|--------|----------------------------------------|
//! | operational                   | own    | own                                    |
//! | store unique violation        | 400    | `Duplicate value for <fields>`         |
//! | store record not found        | 404    | `Record not found`                     |
//! | store constraint / validation | 400    | `Validation error`                     |
//! | anything else                 | 500    | own message; `Internal Server Error` in production |

use std::backtrace::{Backtrace, BacktraceStatus};
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use carfleet_telemetry::Environment;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use utoipa::ToSchema;

use crate::store::StoreError;

/// Message substituted for unknown errors in production.
pub const GENERIC_MESSAGE: &str = "Internal Server Error";

/// Client-facing error body.
///
/// `stack` and `errors` are only present outside production.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Always `"error"`.
    pub status: String,
    /// HTTP status code, repeated in the body.
    pub status_code: u16,
    /// Human-readable message.
    pub message: String,
    /// Rendered error chain and backtrace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Collaborator error code and detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

/// Application error returned by handlers and middleware.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// Expected failure with an explicit status (bad input, missing route,
    /// timeout).
    #[error("{message}")]
    Operational {
        /// Status returned to the client.
        status: StatusCode,
        /// Message returned to the client.
        message: String,
    },

    /// Failure reported by the persistent store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unexpected failure, including caught panics.
    #[error("{message}")]
    Internal {
        /// Original message.
        message: String,
        /// Backtrace rendered at construction, when backtraces are enabled.
        trace: Option<String>,
    },
}

impl ApiError {
    /// Operational error with an explicit status.
    pub fn operational(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Operational {
            status,
            message: message.into(),
        }
    }

    /// 400 operational error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, message)
    }

    /// 404 operational error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::NOT_FOUND, message)
    }

    /// Unknown error. Captures a backtrace when `RUST_BACKTRACE` enables it.
    pub fn internal(message: impl Into<String>) -> Self {
        let backtrace = Backtrace::capture();
        let trace = (backtrace.status() == BacktraceStatus::Captured).then(|| backtrace.to_string());
        Self::Internal {
            message: message.into(),
            trace,
        }
    }

    /// Type name reported in the error record.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Operational { .. } => "OperationalError",
            Self::Store(_) => "StoreError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// `Name: message`, followed by the source chain and the captured
    /// backtrace when there is one.
    pub fn stack(&self) -> String {
        let mut stack = format!("{}: {}", self.name(), self);
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            stack.push_str(&format!("\n  caused by: {cause}"));
            source = cause.source();
        }
        if let Self::Internal {
            trace: Some(trace), ..
        } = self
        {
            stack.push('\n');
            stack.push_str(trace);
        }
        stack
    }

    /// Collaborator detail exposed as `errors` outside production.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::Store(err) => Some(json!({ "code": err.code(), "meta": err.meta() })),
            _ => None,
        }
    }

    /// Build the client payload for `environment`.
    pub fn payload(&self, environment: Environment) -> (StatusCode, ErrorPayload) {
        let classification = classify(self);
        let status = classification.status();
        let expose = !environment.is_production();
        let payload = ErrorPayload {
            status: "error".to_string(),
            status_code: status.as_u16(),
            message: classification.client_message(environment),
            stack: expose.then(|| self.stack()),
            errors: if expose { self.details() } else { None },
        };
        (status, payload)
    }
}

/// The error behind a response, left in the response extensions for the
/// centralized handler.
#[derive(Debug, Clone)]
pub struct ErrorSlot(pub Arc<ApiError>);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, payload) = self.payload(Environment::Production);
        let mut response = (status, Json(payload)).into_response();
        response.extensions_mut().insert(ErrorSlot(Arc::new(self)));
        response
    }
}

/// Outcome of classifying an [`ApiError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Explicit status and message.
    Operational {
        /// Status returned to the client.
        status: StatusCode,
        /// Message returned to the client.
        message: String,
    },
    /// Unique constraint violation.
    StoreConstraint {
        /// Driver error code.
        code: String,
        /// Columns covered by the constraint.
        target_fields: Vec<String>,
    },
    /// Record not found.
    StoreNotFound,
    /// Constraint or validation failure.
    StoreValidation {
        /// Driver error code.
        code: String,
    },
    /// Anything else.
    Unknown {
        /// Original message.
        message: String,
    },
}

impl Classification {
    /// Status returned to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Operational { status, .. } => *status,
            Self::StoreConstraint { .. } | Self::StoreValidation { .. } => StatusCode::BAD_REQUEST,
            Self::StoreNotFound => StatusCode::NOT_FOUND,
            Self::Unknown { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to the client in `environment`.
    pub fn client_message(&self, environment: Environment) -> String {
        match self {
            Self::Operational { message, .. } => message.clone(),
            Self::StoreConstraint { target_fields, .. } => {
                format!("Duplicate value for {}", target_fields.join(", "))
            }
            Self::StoreNotFound => "Record not found".to_string(),
            Self::StoreValidation { .. } => "Validation error".to_string(),
            Self::Unknown { .. } if environment.is_production() => GENERIC_MESSAGE.to_string(),
            Self::Unknown { message } => message.clone(),
        }
    }
}

/// Classify an error for the client response.
pub fn classify(err: &ApiError) -> Classification {
    match err {
        ApiError::Operational { status, message } => Classification::Operational {
            status: *status,
            message: message.clone(),
        },
        ApiError::Store(StoreError::UniqueViolation { code, fields }) => {
            Classification::StoreConstraint {
                code: code.clone(),
                target_fields: fields.clone(),
            }
        }
        ApiError::Store(StoreError::NotFound) => Classification::StoreNotFound,
        ApiError::Store(StoreError::Validation { code, .. }) => Classification::StoreValidation {
            code: code.clone(),
        },
        ApiError::Store(other) => Classification::Unknown {
            message: other.to_string(),
        },
        ApiError::Internal { message, .. } => Classification::Unknown {
            message: message.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn unique_email() -> ApiError {
        ApiError::Store(StoreError::UniqueViolation {
            code: "23505".to_string(),
            fields: vec!["email".to_string()],
        })
    }

    #[test]
    fn operational_passes_status_and_message_through() {
        let err = ApiError::operational(StatusCode::CONFLICT, "plate already registered");
        let c = classify(&err);
        assert_eq!(c.status(), StatusCode::CONFLICT);
        assert_eq!(c.client_message(Environment::Production), "plate already registered");
    }

    #[test]
    fn unique_violation_names_fields() {
        let c = classify(&unique_email());
        assert_eq!(c.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            c.client_message(Environment::Development),
            "Duplicate value for email"
        );
    }

    #[test]
    fn store_not_found_and_validation() {
        let c = classify(&ApiError::Store(StoreError::NotFound));
        assert_eq!(c.status(), StatusCode::NOT_FOUND);
        assert_eq!(c.client_message(Environment::Production), "Record not found");

        let c = classify(&ApiError::Store(StoreError::Validation {
            code: "23502".to_string(),
            message: "null value in column \"vin\"".to_string(),
        }));
        assert_eq!(c.status(), StatusCode::BAD_REQUEST);
        assert_eq!(c.client_message(Environment::Development), "Validation error");
    }

    #[test]
    fn unknown_message_hidden_in_production() {
        let c = classify(&ApiError::internal("boom"));
        assert_eq!(c.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(c.client_message(Environment::Development), "boom");
        assert_eq!(c.client_message(Environment::Production), GENERIC_MESSAGE);
    }

    #[test]
    fn unavailable_store_is_unknown() {
        let c = classify(&ApiError::Store(StoreError::Unavailable("refused".into())));
        assert_eq!(c.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn stack_starts_with_name_and_message() {
        let err = ApiError::internal("boom");
        assert!(err.stack().starts_with("InternalError: boom"), "{}", err.stack());
        assert_eq!(ApiError::bad_request("x").name(), "OperationalError");
        assert_eq!(unique_email().name(), "StoreError");
    }

    #[test]
    fn payload_exposure_follows_mode() {
        let (_, dev) = unique_email().payload(Environment::Development);
        assert!(dev.stack.is_some());
        assert_eq!(dev.errors.as_ref().unwrap()["code"], "23505");

        let (status, prod) = unique_email().payload(Environment::Production);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(prod.stack.is_none());
        assert!(prod.errors.is_none());
        assert_eq!(prod.status, "error");
        assert_eq!(prod.status_code, 400);
    }

    #[test]
    fn payload_serializes_camel_case() {
        let (_, payload) = ApiError::not_found("Route /nope not found").payload(Environment::Production);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["statusCode"], 404);
        assert_eq!(value["message"], "Route /nope not found");
        assert!(value.get("stack").is_none());
        assert!(value.get("errors").is_none());
    }

    #[tokio::test]
    async fn into_response_is_production_safe_and_carries_slot() {
        let response = ApiError::internal("db password is hunter2").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let slot = response.extensions().get::<ErrorSlot>().cloned().unwrap();
        assert_eq!(slot.0.to_string(), "db password is hunter2");

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorPayload = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.message, GENERIC_MESSAGE);
        assert!(body.stack.is_none());
    }
}
