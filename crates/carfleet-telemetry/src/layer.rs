//! # Tracing Bridge
//!
//! [`RouterLayer`] lets ambient `tracing` events (startup banners, sqlx
//! diagnostics, collaborator failures) land in the same sinks as the
//! request pipeline's records.
//!
//! | tracing level     | router level |
//! |-------------------|--------------|
//! | `ERROR`           | `error`      |
//! | `WARN`            | `warn`       |
//! | `INFO`            | `info`       |
//! | `DEBUG`, `TRACE`  | `debug`      |
//!
//! Events with target `http` are routed at `http` regardless of level.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::level::LogLevel;
use crate::record::{LogRecord, Metadata};
use crate::router::LogRouter;

/// Target that maps an event to [`LogLevel::Http`].
pub const HTTP_TARGET: &str = "http";

/// Forwards `tracing` events into a [`LogRouter`].
#[derive(Debug, Clone)]
pub struct RouterLayer {
    router: Arc<LogRouter>,
}

impl RouterLayer {
    /// Wrap a shared router.
    pub fn new(router: Arc<LogRouter>) -> Self {
        Self { router }
    }

    /// Router level for an event.
    pub fn level_for(level: &Level, target: &str) -> LogLevel {
        if target == HTTP_TARGET {
            return LogLevel::Http;
        }
        match *level {
            Level::ERROR => LogLevel::Error,
            Level::WARN => LogLevel::Warn,
            Level::INFO => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

impl<S: Subscriber> Layer<S> for RouterLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = Self::level_for(meta.level(), meta.target());
        if !self.router.enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        visitor
            .fields
            .insert("target".to_string(), Value::String(meta.target().to_string()));

        self.router.emit(
            LogRecord::new(level, visitor.message.unwrap_or_default()).with_metadata(visitor.fields),
        );
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Metadata,
}

impl FieldVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }
}
