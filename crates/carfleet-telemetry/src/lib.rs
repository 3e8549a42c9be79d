#![deny(missing_docs)]

//! # carfleet-telemetry — Structured Observability for the CarFleet API
//!
//! This crate owns everything that happens to a log line after a call site
//! decides to produce one. It has no HTTP dependency: the API crate builds
//! [`LogRecord`]s from requests and responses and hands them to a
//! [`LogRouter`].
//!
//! ## Pieces
//!
//! 1. **[`LogLevel`]** — five severities (`error`, `warn`, `info`, `http`,
//!    `debug`), totally ordered, `error` highest.
//!
//! 2. **[`sanitize`]** — top-level redaction of sensitive keys in JSON
//!    payloads before they reach any sink.
//!
//! 3. **[`LogRouter`]** — fans a record out to every [`Sink`] whose floor
//!    admits the record's level. File sinks write through a non-blocking
//!    worker into a [`RollingFile`] that rotates per calendar day and per
//!    size cap, and prunes old days.
//!
//! 4. **[`RouterLayer`]** — a `tracing_subscriber` layer forwarding ambient
//!    `tracing` events into the same router.

pub mod error;
pub mod format;
pub mod layer;
pub mod level;
pub mod mode;
pub mod record;
pub mod rotate;
pub mod router;
pub mod sanitize;
pub mod sink;

pub use error::TelemetryError;
pub use layer::RouterLayer;
pub use level::LogLevel;
pub use mode::Environment;
pub use record::{LogRecord, Metadata};
pub use rotate::RollingFile;
pub use router::{LogRouter, RouterConfig};
pub use sanitize::{
    sanitize, REDACTION_MARKER, REQUEST_SENSITIVE_KEYS, RESPONSE_SENSITIVE_KEYS,
};
pub use sink::{CapturedRecords, ConsoleSink, FileSink, MemorySink, Sink, SinkTarget};
