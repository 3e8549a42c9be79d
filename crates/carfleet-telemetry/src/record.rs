//! # Log Records
//!
//! A [`LogRecord`] is built at the call site (request start, response
//! emission, error), handed to the router, and never mutated afterwards.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::level::LogLevel;

/// Open key/value metadata attached to a record.
pub type Metadata = serde_json::Map<String, Value>;

/// The unit emitted to sinks.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Creation instant.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable summary.
    pub message: String,
    /// Request context, durations, error detail.
    pub metadata: Metadata,
}

impl LogRecord {
    /// Create a record stamped with the current time and no metadata.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            metadata: Metadata::new(),
        }
    }

    /// Replace the metadata with the entries of a JSON value.
    ///
    /// Objects contribute their entries directly; `null` contributes
    /// nothing; any other value is stored under `"value"`.
    pub fn with_fields(mut self, fields: Value) -> Self {
        self.metadata = into_metadata(fields);
        self
    }

    /// Replace the metadata map.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Add a single metadata entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// ISO-8601 timestamp with millisecond precision.
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Look up a metadata entry.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

/// Convert an arbitrary JSON value into a metadata map.
pub fn into_metadata(value: Value) -> Metadata {
    match value {
        Value::Object(map) => map,
        Value::Null => Metadata::new(),
        other => {
            let mut map = Metadata::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}
