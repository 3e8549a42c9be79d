//! # Response Interception
//!
//! Sits outside the centralized error handler, so it observes the final
//! response whichever path produced it (handler, fallback, error, panic,
//! timeout). The body is buffered, logged, and forwarded byte-for-byte.

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use carfleet_telemetry::{sanitize, Environment, LogLevel, LogRecord, RESPONSE_SENSITIVE_KEYS};
use serde_json::{json, Value};

use crate::middleware::request_context::{context_or_default, RequestContext};
use crate::state::AppState;

/// Serialized body length above which the logged body is truncated.
pub const MAX_LOGGED_BODY_CHARS: usize = 1000;

/// Reason logged in place of successful bodies in production.
pub const PRODUCTION_SUCCESS_REASON: &str = "Success response - body not logged in production";

/// Parse a response body for logging: JSON when it parses, text otherwise,
/// `null` when empty.
pub fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Replace a body whose JSON serialization exceeds
/// [`MAX_LOGGED_BODY_CHARS`] with a preview.
pub fn truncate_for_log(body: Value) -> Value {
    let serialized = body.to_string();
    let size = serialized.chars().count();
    if size <= MAX_LOGGED_BODY_CHARS {
        return body;
    }
    let preview: String = serialized.chars().take(MAX_LOGGED_BODY_CHARS).collect();
    json!({
        "truncated": true,
        "preview": format!("{preview}..."),
        "originalSize": size,
    })
}

/// The body as it appears in the log record.
pub fn response_body_for_log(environment: Environment, status: StatusCode, bytes: &[u8]) -> Value {
    if environment.is_production() && status.as_u16() < 400 {
        return json!({ "logged": false, "reason": PRODUCTION_SUCCESS_REASON });
    }
    truncate_for_log(sanitize(&parse_body(bytes), RESPONSE_SENSITIVE_KEYS))
}

/// `error` for status 400 and above, `http` otherwise.
pub fn response_level(status: StatusCode) -> LogLevel {
    if status.as_u16() >= 400 {
        LogLevel::Error
    } else {
        LogLevel::Http
    }
}

/// Build the record for one finished response.
pub fn response_record(
    ctx: &RequestContext,
    environment: Environment,
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> LogRecord {
    let level = response_level(status);
    let message = if level == LogLevel::Error {
        "HTTP Response Error"
    } else {
        "HTTP Response"
    };
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| Value::String(v.to_string()))
    };
    let content_length =
        header_value(header::CONTENT_LENGTH).unwrap_or_else(|| Value::String(body.len().to_string()));

    LogRecord::new(level, message).with_fields(json!({
        "type": "RESPONSE",
        "request_id": ctx.correlation_id,
        "ip": ctx.client_address,
        "method": ctx.method.as_str(),
        "url": ctx.url,
        "status_code": status.as_u16(),
        "status_message": status.canonical_reason().unwrap_or_default(),
        "duration_ms": ctx.elapsed_ms(),
        "user_agent": ctx.user_agent,
        "user_id": ctx.user_id,
        "request_body": ctx.body.as_ref().map(|b| sanitize(b, RESPONSE_SENSITIVE_KEYS)),
        "query_params": ctx.query,
        "response_body": response_body_for_log(environment, status, body),
        "headers": {
            "content_type": header_value(header::CONTENT_TYPE),
            "content_length": content_length,
        },
    }))
}

/// Response-interceptor middleware.
pub async fn response_log(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ctx = context_or_default(&request);
    let response = next.run(request).await;
    let (parts, body) = response.into_parts();

    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            state.log.error(
                "Response body could not be buffered",
                json!({
                    "request_id": ctx.correlation_id,
                    "url": ctx.url,
                    "error": err.to_string(),
                }),
            );
            Bytes::new()
        }
    };

    state.log.emit(response_record(
        &ctx,
        state.environment(),
        parts.status,
        &parts.headers,
        &bytes,
    ));
    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Method, Uri};

    fn ctx(body: &[u8]) -> RequestContext {
        let uri: Uri = "/api/users?page=1".parse().unwrap();
        RequestContext::capture(&Method::POST, &uri, &HeaderMap::new(), None, None, body)
    }

    #[test]
    fn level_follows_status() {
        assert_eq!(response_level(StatusCode::OK), LogLevel::Http);
        assert_eq!(response_level(StatusCode::PERMANENT_REDIRECT), LogLevel::Http);
        assert_eq!(response_level(StatusCode::BAD_REQUEST), LogLevel::Error);
        assert_eq!(response_level(StatusCode::SERVICE_UNAVAILABLE), LogLevel::Error);
    }

    #[test]
    fn production_success_bodies_are_withheld() {
        let body = response_body_for_log(Environment::Production, StatusCode::OK, br#"{"id":1}"#);
        assert_eq!(body, json!({"logged": false, "reason": PRODUCTION_SUCCESS_REASON}));

        let body = response_body_for_log(
            Environment::Production,
            StatusCode::NOT_FOUND,
            br#"{"message":"nope"}"#,
        );
        assert_eq!(body, json!({"message": "nope"}));
    }

    #[test]
    fn development_bodies_are_sanitized() {
        let body = response_body_for_log(
            Environment::Development,
            StatusCode::OK,
            br#"{"id":1,"token":"abc","ssn":"123"}"#,
        );
        assert_eq!(body["id"], 1);
        assert_eq!(body["token"], "***REDACTED***");
        assert_eq!(body["ssn"], "***REDACTED***");
    }

    #[test]
    fn text_and_empty_bodies() {
        assert_eq!(parse_body(b""), Value::Null);
        assert_eq!(parse_body(b"ok"), json!("ok"));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let long = json!({ "data": "x".repeat(1500) });
        let original = long.to_string();
        let out = truncate_for_log(long);
        assert_eq!(out["truncated"], true);
        assert_eq!(out["originalSize"], original.chars().count());
        let preview = out["preview"].as_str().unwrap();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), MAX_LOGGED_BODY_CHARS + 3);
        assert!(original.starts_with(&preview[..preview.len() - 3]));
    }

    #[test]
    fn short_bodies_are_kept() {
        let body = json!({ "data": "x".repeat(10) });
        assert_eq!(truncate_for_log(body.clone()), body);
    }

    #[test]
    fn record_carries_request_and_response_fields() {
        let ctx = ctx(br#"{"username":"ada","password":"hunter2"}"#);
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let record = response_record(
            &ctx,
            Environment::Development,
            StatusCode::CREATED,
            &headers,
            br#"{"id":1}"#,
        );
        assert_eq!(record.level, LogLevel::Http);
        assert_eq!(record.message, "HTTP Response");
        assert_eq!(record.field("type"), Some(&json!("RESPONSE")));
        assert_eq!(record.field("status_code"), Some(&json!(201)));
        assert_eq!(record.field("status_message"), Some(&json!("Created")));
        assert_eq!(record.field("url"), Some(&json!("/api/users?page=1")));
        assert_eq!(record.field("user_id"), Some(&json!("anonymous")));
        assert_eq!(record.field("request_body").unwrap()["password"], "***REDACTED***");
        assert_eq!(record.field("query_params").unwrap()["page"], "1");
        assert_eq!(record.field("response_body"), Some(&json!({"id": 1})));
        assert_eq!(record.field("headers").unwrap()["content_type"], "application/json");
        assert_eq!(record.field("headers").unwrap()["content_length"], "8");
    }

    #[test]
    fn error_status_uses_error_message() {
        let record = response_record(
            &ctx(b""),
            Environment::Production,
            StatusCode::INTERNAL_SERVER_ERROR,
            &HeaderMap::new(),
            b"",
        );
        assert_eq!(record.level, LogLevel::Error);
        assert_eq!(record.message, "HTTP Response Error");
        assert_eq!(record.field("request_body"), Some(&Value::Null));
    }
}
