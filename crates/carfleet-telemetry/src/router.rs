//! # Log Router
//!
//! Fans each [`LogRecord`] out to every sink whose floor admits it, after a
//! global floor check. Emission is synchronous up to the sink boundary:
//! the console sink writes one locked line, file sinks hand the line to a
//! non-blocking worker.
//!
//! The router is an explicit value shared as `Arc<LogRouter>`. Tests build
//! one with [`LogRouter::capture`] and inspect what was emitted.

use std::path::PathBuf;

use parking_lot::Mutex;
use serde_json::Value;
use tracing_appender::non_blocking::WorkerGuard;

use crate::error::TelemetryError;
use crate::level::LogLevel;
use crate::mode::Environment;
use crate::record::{into_metadata, LogRecord};
use crate::rotate::{MAX_FILE_BYTES, RETENTION_DAYS};
use crate::sink::{CapturedRecords, ConsoleSink, FileSink, MemorySink, Sink, SinkTarget};

/// Settings for [`LogRouter::open`].
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Runtime mode; selects the global floor.
    pub environment: Environment,
    /// Directory holding the rotating files.
    pub log_dir: PathBuf,
    /// Console floor override. Never admits more than the global floor.
    pub console_floor: Option<LogLevel>,
    /// Colorize console lines.
    pub colorize: bool,
    /// Size cap per file segment.
    pub max_file_bytes: u64,
    /// Days of files kept on disk.
    pub retention_days: i64,
}

impl RouterConfig {
    /// Defaults for `environment` writing under `log_dir`. Color is on
    /// unless `NO_COLOR` is set.
    pub fn new(environment: Environment, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            environment,
            log_dir: log_dir.into(),
            console_floor: None,
            colorize: std::env::var_os("NO_COLOR").is_none(),
            max_file_bytes: MAX_FILE_BYTES,
            retention_days: RETENTION_DAYS,
        }
    }
}

/// Routes leveled records to console and file sinks.
pub struct LogRouter {
    floor: LogLevel,
    sinks: Vec<Box<dyn Sink>>,
    guards: Mutex<Vec<WorkerGuard>>,
}

impl std::fmt::Debug for LogRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogRouter")
            .field("floor", &self.floor)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl LogRouter {
    /// Open the console sink and one rotating file sink per [`SinkTarget`].
    ///
    /// Creating the log directory is the only fatal step; it surfaces as
    /// [`TelemetryError::LogDirectory`].
    pub fn open(config: &RouterConfig) -> Result<Self, TelemetryError> {
        let created = !config.log_dir.exists();
        std::fs::create_dir_all(&config.log_dir).map_err(|source| {
            TelemetryError::LogDirectory {
                path: config.log_dir.display().to_string(),
                source,
            }
        })?;

        let floor = config.environment.default_floor();
        let console_floor = config.console_floor.map_or(floor, |f| f.max(floor));

        let mut sinks: Vec<Box<dyn Sink>> =
            vec![Box::new(ConsoleSink::new(console_floor, config.colorize))];
        let mut guards = Vec::with_capacity(SinkTarget::ALL.len());
        for target in SinkTarget::ALL {
            let (sink, guard) = FileSink::open(
                &config.log_dir,
                target,
                target.floor(floor),
                config.max_file_bytes,
                config.retention_days,
            );
            sinks.push(Box::new(sink));
            guards.push(guard);
        }

        let router = Self {
            floor,
            sinks,
            guards: Mutex::new(guards),
        };
        if created {
            router.info(
                "Logs directory created",
                serde_json::json!({ "path": config.log_dir.display().to_string() }),
            );
        }
        Ok(router)
    }

    /// Build a router over arbitrary sinks.
    pub fn with_sinks(floor: LogLevel, sinks: Vec<Box<dyn Sink>>) -> Self {
        Self {
            floor,
            sinks,
            guards: Mutex::new(Vec::new()),
        }
    }

    /// A router with a single in-memory sink admitting every level.
    pub fn capture() -> (Self, CapturedRecords) {
        let (sink, captured) = MemorySink::new(LogLevel::Debug);
        (Self::with_sinks(LogLevel::Debug, vec![Box::new(sink)]), captured)
    }

    /// Global floor.
    pub fn floor(&self) -> LogLevel {
        self.floor
    }

    /// Whether a record at `level` would reach any sink.
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.floor.admits(level) && self.sinks.iter().any(|s| s.floor().admits(level))
    }

    /// Dispatch a record to every admitting sink.
    pub fn emit(&self, record: LogRecord) {
        if !self.floor.admits(record.level) {
            return;
        }
        for sink in &self.sinks {
            if sink.floor().admits(record.level) {
                sink.write(&record);
            }
        }
    }

    /// Build and emit a record from a message and JSON metadata.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, metadata: Value) {
        if !self.floor.admits(level) {
            return;
        }
        self.emit(LogRecord::new(level, message).with_metadata(into_metadata(metadata)));
    }

    /// Emit at `error`.
    pub fn error(&self, message: impl Into<String>, metadata: Value) {
        self.log(LogLevel::Error, message, metadata);
    }

    /// Emit at `warn`.
    pub fn warn(&self, message: impl Into<String>, metadata: Value) {
        self.log(LogLevel::Warn, message, metadata);
    }

    /// Emit at `info`.
    pub fn info(&self, message: impl Into<String>, metadata: Value) {
        self.log(LogLevel::Info, message, metadata);
    }

    /// Emit at `http`.
    pub fn http(&self, message: impl Into<String>, metadata: Value) {
        self.log(LogLevel::Http, message, metadata);
    }

    /// Emit at `debug`.
    pub fn debug(&self, message: impl Into<String>, metadata: Value) {
        self.log(LogLevel::Debug, message, metadata);
    }

    /// Flush and stop the file workers. Records emitted afterwards are
    /// dropped by the file sinks; the console keeps working.
    pub fn close(&self) {
        let guards = std::mem::take(&mut *self.guards.lock());
        drop(guards);
    }
}
