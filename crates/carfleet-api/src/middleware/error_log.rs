//! # Centralized Error Handling
//!
//! Every error path ends here: handler `Err`s, the unmatched-route
//! fallback, buffering failures recorded by the annotator, caught panics,
//! and the per-request timeout. Each error is logged once as
//! `"Unhandled Error"`, classified, and answered with a payload shaped for
//! the runtime mode. A router-level 405 for a known path is converted into
//! an operational error here too.

use std::any::Any;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use carfleet_telemetry::{sanitize, LogLevel, LogRecord, REQUEST_SENSITIVE_KEYS};
use serde_json::{json, Value};

use crate::error::{ApiError, ErrorSlot};
use crate::middleware::request_context::{context_or_default, sanitize_headers, RequestContext};
use crate::state::AppState;

/// Message of the 408 produced when a request exceeds its timeout.
pub const TIMEOUT_MESSAGE: &str = "Request timeout";

tokio::task_local! {
    static HANDLING_REQUEST: ();
}

/// Whether the caller runs inside the error handler's scope. A panic raised
/// there is caught and logged as `"Unhandled Error"`, so the process panic
/// hook skips it.
pub fn in_request() -> bool {
    HANDLING_REQUEST.try_with(|_| ()).is_ok()
}

/// Build the `"Unhandled Error"` record for `err` raised while serving `ctx`.
pub fn error_record(ctx: &RequestContext, err: &ApiError, status: StatusCode) -> LogRecord {
    let mut record = LogRecord::new(LogLevel::Error, "Unhandled Error").with_fields(json!({
        "type": "ERROR",
        "request_id": ctx.correlation_id,
        "ip": ctx.client_address,
        "method": ctx.method.as_str(),
        "url": ctx.url,
        "user_id": ctx.user_id,
        "error": {
            "message": err.to_string(),
            "stack": err.stack(),
            "name": err.name(),
        },
        "status_code": status.as_u16(),
        "request_body": ctx.body.as_ref().map(|b| sanitize(b, REQUEST_SENSITIVE_KEYS)),
        "query_params": ctx.query,
        "headers": sanitize_headers(&ctx.headers),
    }));
    if let ApiError::Store(store) = err {
        record = record
            .with("code", store.code().map_or(Value::Null, Value::from))
            .with("meta", store.meta());
    }
    record
}

/// Error-handling middleware. Also enforces the per-request timeout.
pub async fn error_log(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ctx = context_or_default(&request);

    let mut response = match &ctx.body_error {
        Some(err) => err.clone().into_response(),
        None => match tokio::time::timeout(
            state.config.request_timeout,
            HANDLING_REQUEST.scope((), next.run(request)),
        )
        .await
        {
            Ok(response) => response,
            Err(_) => ApiError::operational(StatusCode::REQUEST_TIMEOUT, TIMEOUT_MESSAGE)
                .into_response(),
        },
    };

    let err = match response.extensions_mut().remove::<ErrorSlot>() {
        Some(ErrorSlot(err)) => err,
        None if response.status() == StatusCode::METHOD_NOT_ALLOWED => {
            Arc::new(method_not_allowed(&ctx))
        }
        None => return response,
    };

    let (status, payload) = err.payload(state.environment());
    state.log.emit(error_record(&ctx, &err, status));
    let mut rebuilt = (status, Json(payload)).into_response();
    if let Some(allow) = response.headers().get(header::ALLOW) {
        rebuilt.headers_mut().insert(header::ALLOW, allow.clone());
    }
    rebuilt
}

fn method_not_allowed(ctx: &RequestContext) -> ApiError {
    ApiError::operational(
        StatusCode::METHOD_NOT_ALLOWED,
        format!("Method {} not allowed for {}", ctx.method, ctx.url),
    )
}

/// Response for a panic caught by `CatchPanicLayer`. The error travels in
/// the response extensions like any handler error.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "Unknown panic".to_string()
    };
    ApiError::internal(message).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{StoreError, UNIQUE_VIOLATION};
    use axum::http::{header, HeaderMap, HeaderValue, Method, Uri};

    fn ctx() -> RequestContext {
        let uri: Uri = "/api/users?page=2".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.0"));
        RequestContext::capture(
            &Method::POST,
            &uri,
            &headers,
            None,
            None,
            br#"{"email":"a@b.c","password":"pw"}"#,
        )
    }

    #[test]
    fn record_carries_context_and_error() {
        let err = ApiError::internal("boom");
        let record = error_record(&ctx(), &err, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(record.level, LogLevel::Error);
        assert_eq!(record.message, "Unhandled Error");
        assert_eq!(record.field("type"), Some(&json!("ERROR")));
        assert_eq!(record.field("status_code"), Some(&json!(500)));
        assert_eq!(record.field("url"), Some(&json!("/api/users?page=2")));
        let error = record.field("error").unwrap();
        assert_eq!(error["message"], "boom");
        assert_eq!(error["name"], "InternalError");
        assert!(error["stack"].as_str().unwrap().starts_with("InternalError: boom"));
        assert_eq!(record.field("request_body").unwrap()["password"], "***REDACTED***");
        assert_eq!(record.field("request_body").unwrap()["email"], "a@b.c");
        assert_eq!(record.field("headers").unwrap()["authorization"], "***REDACTED***");
        assert_eq!(record.field("headers").unwrap()["user-agent"], "curl/8.0");
        assert!(record.field("code").is_none());
    }

    #[test]
    fn store_errors_add_code_and_meta() {
        let err = ApiError::Store(StoreError::UniqueViolation {
            code: UNIQUE_VIOLATION.to_string(),
            fields: vec!["email".to_string()],
        });
        let record = error_record(&ctx(), &err, StatusCode::BAD_REQUEST);
        assert_eq!(record.field("code"), Some(&json!(UNIQUE_VIOLATION)));
        assert_eq!(record.field("meta"), Some(&json!({"target": ["email"]})));
    }

    #[test]
    fn panic_messages_are_recovered() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let slot = response.extensions().get::<ErrorSlot>().unwrap();
        assert_eq!(slot.0.to_string(), "boom");

        let response = panic_response(Box::new(String::from("owned boom")));
        let slot = response.extensions().get::<ErrorSlot>().unwrap();
        assert_eq!(slot.0.to_string(), "owned boom");

        let response = panic_response(Box::new(42_u8));
        let slot = response.extensions().get::<ErrorSlot>().unwrap();
        assert_eq!(slot.0.to_string(), "Unknown panic");
    }

    #[test]
    fn method_not_allowed_is_operational() {
        let err = method_not_allowed(&ctx());
        assert_eq!(err.to_string(), "Method POST not allowed for /api/users?page=2");
        let (status, payload) = err.payload(carfleet_telemetry::Environment::Production);
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(payload.status_code, 405);
    }

    #[tokio::test]
    async fn request_scope_is_visible_only_inside() {
        assert!(!in_request());
        assert!(HANDLING_REQUEST.scope((), async { in_request() }).await);
        assert!(!in_request());
    }
}
