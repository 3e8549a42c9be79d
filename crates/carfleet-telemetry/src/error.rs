//! # Error Types
//!
//! Failures surfaced by the telemetry crate. Only [`TelemetryError::LogDirectory`]
//! is fatal to the process; everything on the write path degrades to a
//! dropped line instead of an error.

use thiserror::Error;

/// Errors raised while configuring logging.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The log directory could not be created at startup.
    #[error("failed to create log directory {path}: {source}")]
    LogDirectory {
        /// Directory that was being created.
        path: String,
        /// Underlying filesystem error.
        source: std::io::Error,
    },

    /// A log level name did not match any known level.
    #[error("unknown log level: {0}")]
    UnknownLevel(String),

    /// A runtime mode name did not match any known mode.
    #[error("unknown environment: {0} (expected development, production or test)")]
    UnknownEnvironment(String),

    /// I/O error while opening a sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
