//! # Access Log
//!
//! One `http` line per request, rendered from a morgan-style template of
//! named fields:
//!
//! ```text
//! :real-ip :method :url :status :response-time ms - :user-agent
//! ```
//!
//! Production renders a JSON object instead, one template per key, so the
//! line can be shipped without re-parsing. Unknown `:tokens` are kept as
//! literal text and missing values render as `-`.
//!
//! The logger is skipped entirely in the `test` mode.

use std::time::Duration;

use axum::body::HttpBody;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use carfleet_telemetry::{sanitize, Environment, REQUEST_SENSITIVE_KEYS};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::middleware::request_context::{context_or_default, RequestContext};
use crate::state::AppState;

/// Development line template.
pub const DEVELOPMENT_FORMAT: &str = ":real-ip :method :url :status :response-time ms - :user-agent";

/// Production JSON template, in emission order.
pub const PRODUCTION_FORMAT: &[(&str, &str)] = &[
    ("timestamp", ":date[iso]"),
    ("ip", ":real-ip"),
    ("method", ":method"),
    ("url", ":url"),
    ("status", ":status"),
    ("contentLength", ":res[content-length]"),
    ("responseTime", ":response-time ms"),
    ("userAgent", ":user-agent"),
    ("userId", ":user-id"),
    ("requestBody", ":request-body"),
    ("queryParams", ":query-params"),
    ("referrer", ":referrer"),
];

const MISSING: &str = "-";

/// Named fields a template can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// `:real-ip`
    RealIp,
    /// `:method`
    Method,
    /// `:url`
    Url,
    /// `:status`
    Status,
    /// `:response-time`, milliseconds with three decimals.
    ResponseTime,
    /// `:user-agent`
    UserAgent,
    /// `:user-id`
    UserId,
    /// `:request-body`, redacted JSON.
    RequestBody,
    /// `:query-params`, JSON.
    QueryParams,
    /// `:content-length` or `:res[content-length]`
    ContentLength,
    /// `:referrer` or `:referer`
    Referrer,
    /// `:date`, ISO-8601.
    Date,
    /// `:request-id`
    RequestId,
}

impl Field {
    fn lookup(name: &str, arg: Option<&str>) -> Option<Self> {
        Some(match (name, arg) {
            ("real-ip", _) => Self::RealIp,
            ("method", _) => Self::Method,
            ("url", _) => Self::Url,
            ("status", _) => Self::Status,
            ("response-time", _) => Self::ResponseTime,
            ("user-agent", _) => Self::UserAgent,
            ("user-id", _) => Self::UserId,
            ("request-body", _) => Self::RequestBody,
            ("query-params", _) => Self::QueryParams,
            ("content-length", _) | ("res", Some("content-length")) => Self::ContentLength,
            ("referrer" | "referer", _) => Self::Referrer,
            ("date", _) => Self::Date,
            ("request-id", _) => Self::RequestId,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// A parsed line template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a morgan-style template. `:name` and `:name[arg]` are tokens;
    /// everything else is literal.
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(pos) = rest.find(':') {
            literal.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            let name_len = after
                .find(|c: char| !(c.is_ascii_lowercase() || c == '-'))
                .unwrap_or(after.len());
            let name = &after[..name_len];
            let mut consumed = name_len;
            let mut arg = None;
            if after[name_len..].starts_with('[') {
                if let Some(close) = after[name_len..].find(']') {
                    arg = Some(&after[name_len + 1..name_len + close]);
                    consumed = name_len + close + 1;
                }
            }

            match Field::lookup(name, arg).filter(|_| !name.is_empty()) {
                Some(field) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field));
                    rest = &after[consumed..];
                }
                None => {
                    literal.push(':');
                    rest = after;
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Self { segments }
    }

    /// Render against a finished request.
    pub fn render(&self, entry: &AccessEntry<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => out.push_str(&entry.value(*field)),
            }
        }
        out
    }
}

/// Line or JSON access format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessFormat {
    /// A single line template.
    Line(Template),
    /// A JSON object whose string values are templates.
    Json(Vec<(String, Template)>),
}

impl AccessFormat {
    /// The development line format.
    pub fn development() -> Self {
        Self::Line(Template::parse(DEVELOPMENT_FORMAT))
    }

    /// The production JSON format.
    pub fn production() -> Self {
        Self::Json(
            PRODUCTION_FORMAT
                .iter()
                .map(|(key, source)| (key.to_string(), Template::parse(source)))
                .collect(),
        )
    }

    /// The format used in `environment`.
    pub fn for_environment(environment: Environment) -> Self {
        if environment.is_production() {
            Self::production()
        } else {
            Self::development()
        }
    }

    /// Render one access line.
    pub fn render(&self, entry: &AccessEntry<'_>) -> String {
        match self {
            Self::Line(template) => template.render(entry),
            Self::Json(fields) => {
                let body = fields
                    .iter()
                    .map(|(key, template)| {
                        format!(
                            "{}:{}",
                            Value::String(key.clone()),
                            Value::String(template.render(entry))
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{{{body}}}")
            }
        }
    }
}

/// Everything a template can reference about one finished request.
#[derive(Debug)]
pub struct AccessEntry<'a> {
    /// Request state from the annotator.
    pub ctx: &'a RequestContext,
    /// Final status.
    pub status: StatusCode,
    /// Response content length, when known.
    pub content_length: Option<u64>,
    /// Time from annotation to response.
    pub response_time: Duration,
    /// When the line is written.
    pub timestamp: DateTime<Utc>,
}

impl AccessEntry<'_> {
    fn value(&self, field: Field) -> String {
        let ctx = self.ctx;
        match field {
            Field::RealIp => ctx.client_address.clone(),
            Field::Method => ctx.method.to_string(),
            Field::Url => ctx.url.clone(),
            Field::Status => self.status.as_u16().to_string(),
            Field::ResponseTime => format!("{:.3}", self.response_time.as_secs_f64() * 1000.0),
            Field::UserAgent => or_missing(ctx.user_agent.clone()),
            Field::UserId => ctx.user_id.clone(),
            Field::RequestBody => match &ctx.body {
                Some(body) if !is_empty_json(body) => {
                    sanitize(body, REQUEST_SENSITIVE_KEYS).to_string()
                }
                _ => MISSING.to_string(),
            },
            Field::QueryParams if ctx.query.is_empty() => MISSING.to_string(),
            Field::QueryParams => Value::Object(ctx.query.clone()).to_string(),
            Field::ContentLength => or_missing(self.content_length.map(|n| n.to_string())),
            Field::Referrer => or_missing(ctx.referrer.clone()),
            Field::Date => self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            Field::RequestId => ctx.correlation_id.clone(),
        }
    }
}

fn or_missing(value: Option<String>) -> String {
    value.unwrap_or_else(|| MISSING.to_string())
}

fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Whether the access logger stays quiet in `environment`.
pub fn skip(environment: Environment) -> bool {
    environment == Environment::Test
}

/// Access-log middleware.
pub async fn access_log(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ctx = context_or_default(&request);
    let response = next.run(request).await;
    if skip(state.environment()) {
        return response;
    }

    let content_length = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .or_else(|| response.body().size_hint().exact());
    let entry = AccessEntry {
        ctx: &ctx,
        status: response.status(),
        content_length,
        response_time: ctx.start.elapsed(),
        timestamp: Utc::now(),
    };
    state.log.http(state.access_format.render(&entry), Value::Null);
    response
}
