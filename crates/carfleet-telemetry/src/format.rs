//! # Line Formats
//!
//! Console lines are for humans:
//!
//! ```text
//! 2026-10-19T08:12:44.117Z [HTTP]: HTTP Response {
//!   "status_code": 200,
//!   ...
//! }
//! ```
//!
//! File lines are one JSON object each, with `timestamp`, `level` and
//! `message` alongside the flattened metadata.

use colored::Colorize;
use serde_json::Value;

use crate::record::{LogRecord, Metadata};

/// Render a record for the console.
pub fn console_line(record: &LogRecord, colorize: bool) -> String {
    let tag = format!("[{}]", record.level.tag());
    let head = format!("{} {}: {}", record.timestamp_iso(), tag, record.message);
    let line = if record.metadata.is_empty() {
        head
    } else {
        format!("{head} {:#}", Value::Object(record.metadata.clone()))
    };

    if colorize {
        line.color(record.level.color()).to_string()
    } else {
        line
    }
}

/// Render a record as a single JSON line (no trailing newline).
///
/// Metadata keys named `timestamp`, `level` or `message` are shadowed by
/// the record's own values.
pub fn file_line(record: &LogRecord) -> String {
    let mut object = Metadata::new();
    object.insert("timestamp".to_string(), Value::String(record.timestamp_iso()));
    object.insert(
        "level".to_string(),
        Value::String(record.level.as_str().to_string()),
    );
    object.insert("message".to_string(), Value::String(record.message.clone()));
    for (key, value) in &record.metadata {
        object.entry(key.clone()).or_insert_with(|| value.clone());
    }
    Value::Object(object).to_string()
}
