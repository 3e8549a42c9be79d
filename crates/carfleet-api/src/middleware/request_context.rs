//! # Request Annotation
//!
//! Outermost middleware. For every request it:
//!
//! 1. resolves the correlation id (inbound `x-request-id`, else a fresh
//!    UUIDv4) and echoes it on the response;
//! 2. captures the start instant and the client address;
//! 3. buffers the body (10 MiB cap) and parses it as JSON, then forwards the
//!    same bytes to the handler;
//! 4. parses the query string;
//! 5. stores the result as an `Arc<RequestContext>` extension that the
//!    logging stages read after the handler has run.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Query, Request};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::Response;
use carfleet_telemetry::{sanitize, Metadata};
use http_body_util::LengthLimitError;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;

/// Correlation header, inbound and outbound.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Largest request body the pipeline buffers.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// User id recorded when no authenticated user is attached.
pub const ANONYMOUS: &str = "anonymous";

/// Header names whose values never reach a log record.
pub const HEADER_SENSITIVE_KEYS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "proxy-authorization",
];

/// Correlation id extension, for handlers that only need the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

/// Authenticated user id. An auth layer running before the annotator
/// inserts it; without one every request is [`ANONYMOUS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

/// Per-request state captured before the handler runs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id echoed in `x-request-id`.
    pub correlation_id: String,
    /// When the annotator saw the request.
    pub start: Instant,
    /// Resolved client address, or `"unknown"`.
    pub client_address: String,
    /// Request method.
    pub method: Method,
    /// Path and query as received.
    pub url: String,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
    /// `Referer` (or `Referrer`) header.
    pub referrer: Option<String>,
    /// Request body parsed as JSON; `None` when empty or not JSON.
    pub body: Option<Value>,
    /// Query parameters.
    pub query: Metadata,
    /// User id, [`ANONYMOUS`] by default.
    pub user_id: String,
    /// Request headers as received.
    pub headers: HeaderMap,
    /// Set when the body could not be buffered; the error middleware
    /// answers with it instead of running the handler.
    pub body_error: Option<ApiError>,
}

impl RequestContext {
    /// Build a context from request parts and an already-buffered body.
    pub fn capture(
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        user: Option<&UserId>,
        body: &[u8],
    ) -> Self {
        Self {
            correlation_id: annotate(headers),
            start: Instant::now(),
            client_address: resolve_client_address(headers, peer),
            method: method.clone(),
            url: uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| uri.path().to_string()),
            user_agent: header_string(headers, header::USER_AGENT.as_str()),
            referrer: header_string(headers, header::REFERER.as_str())
                .or_else(|| header_string(headers, "referrer")),
            body: parse_json_body(body),
            query: parse_query(uri),
            user_id: user.map_or_else(|| ANONYMOUS.to_string(), |u| u.0.clone()),
            headers: headers.clone(),
            body_error: None,
        }
    }

    /// Whole milliseconds since the request was annotated.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Correlation id for a request: the inbound `x-request-id` verbatim when
/// present and non-blank, otherwise a fresh hyphenated UUIDv4. Non-UTF-8
/// bytes are rendered lossily for the logs.
pub fn annotate(headers: &HeaderMap) -> String {
    inbound_request_id(headers)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// The inbound `x-request-id` value when it is non-blank.
fn inbound_request_id(headers: &HeaderMap) -> Option<&HeaderValue> {
    headers
        .get(&X_REQUEST_ID)
        .filter(|v| !String::from_utf8_lossy(v.as_bytes()).trim().is_empty())
}

/// First non-empty of `x-forwarded-for` (leftmost entry), `x-real-ip`, the
/// transport peer, else `"unknown"`.
pub fn resolve_client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    header_string(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|v| !v.is_empty())
        .or_else(|| header_string(headers, "x-real-ip"))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Headers rendered as a JSON object with sensitive values redacted.
pub fn sanitize_headers(headers: &HeaderMap) -> Value {
    let mut object = Metadata::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match object.get_mut(name.as_str()) {
            Some(Value::String(existing)) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            _ => {
                object.insert(name.as_str().to_string(), Value::String(value));
            }
        }
    }
    sanitize(&Value::Object(object), HEADER_SENSITIVE_KEYS)
}

/// The context stored by the annotator, or a body-less one built from the
/// request when the annotator did not run.
pub fn context_or_default(request: &Request) -> Arc<RequestContext> {
    if let Some(ctx) = request.extensions().get::<Arc<RequestContext>>() {
        return Arc::clone(ctx);
    }
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0);
    Arc::new(RequestContext::capture(
        request.method(),
        request.uri(),
        request.headers(),
        peer,
        request.extensions().get::<UserId>(),
        &[],
    ))
}

/// Annotator middleware.
pub async fn request_context(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let (mut parts, body) = request.into_parts();

    let (bytes, body_error) = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => (bytes, None),
        Err(err) if is_length_limit(&err) => (
            Bytes::new(),
            Some(ApiError::operational(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large",
            )),
        ),
        Err(_) => (
            Bytes::new(),
            Some(ApiError::bad_request("Request body could not be read")),
        ),
    };

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0);
    let mut ctx = RequestContext::capture(
        &parts.method,
        &parts.uri,
        &parts.headers,
        peer,
        parts.extensions.get::<UserId>(),
        &bytes,
    );
    ctx.start = start;
    ctx.body_error = body_error;
    let correlation_id = ctx.correlation_id.clone();
    let echoed = inbound_request_id(&parts.headers)
        .cloned()
        .or_else(|| HeaderValue::from_str(&correlation_id).ok());

    parts.extensions.insert(Arc::new(ctx));
    parts
        .extensions
        .insert(CorrelationId(correlation_id.clone()));

    let mut response = next.run(Request::from_parts(parts, Body::from(bytes))).await;
    if let Some(value) = echoed {
        response.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }
    response
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_json_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(bytes).ok()
}

fn parse_query(uri: &Uri) -> Metadata {
    Query::<HashMap<String, String>>::try_from_uri(uri)
        .map(|Query(params)| {
            params
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect()
        })
        .unwrap_or_default()
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut current = std::error::Error::source(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}
