//! # Sinks
//!
//! A sink is a destination for formatted records. Each sink carries its own
//! floor; the router only calls [`Sink::write`] for records the floor admits.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

use crate::format;
use crate::level::LogLevel;
use crate::record::LogRecord;
use crate::rotate::RollingFile;

/// A destination for log records.
pub trait Sink: Send + Sync {
    /// Least severe level this sink accepts.
    fn floor(&self) -> LogLevel;

    /// Write one record. Failures are swallowed: a sink never fails the caller.
    fn write(&self, record: &LogRecord);
}

/// Logical log file categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkTarget {
    /// Errors only.
    Error,
    /// Everything admitted by the global floor.
    Combined,
    /// HTTP request lines and anything more severe.
    Access,
}

impl SinkTarget {
    /// All file categories.
    pub const ALL: [SinkTarget; 3] = [SinkTarget::Error, SinkTarget::Combined, SinkTarget::Access];

    /// File name prefix for this category.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Combined => "combined",
            Self::Access => "access",
        }
    }

    /// Floor of this category given the global floor.
    pub fn floor(&self, global: LogLevel) -> LogLevel {
        match self {
            Self::Error => LogLevel::Error,
            Self::Combined => global,
            Self::Access => global.max(LogLevel::Http),
        }
    }
}

/// Human-readable output on stdout.
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    floor: LogLevel,
    colorize: bool,
}

impl ConsoleSink {
    /// Create a console sink.
    pub fn new(floor: LogLevel, colorize: bool) -> Self {
        Self { floor, colorize }
    }
}

impl Sink for ConsoleSink {
    fn floor(&self) -> LogLevel {
        self.floor
    }

    fn write(&self, record: &LogRecord) {
        let line = format::console_line(record, self.colorize);
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{line}");
    }
}

/// JSON lines appended to a rotating file through a non-blocking worker.
///
/// The worker is lossy: when its queue is full, lines are dropped rather
/// than blocking the caller.
pub struct FileSink {
    target: SinkTarget,
    floor: LogLevel,
    writer: NonBlocking,
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("target", &self.target)
            .field("floor", &self.floor)
            .finish_non_exhaustive()
    }
}

impl FileSink {
    /// Open a sink for `target` under `dir`. The returned guard flushes
    /// pending lines when dropped.
    pub fn open(
        dir: &Path,
        target: SinkTarget,
        floor: LogLevel,
        max_bytes: u64,
        retention_days: i64,
    ) -> (Self, WorkerGuard) {
        let file = RollingFile::new(dir, target.prefix())
            .with_max_bytes(max_bytes)
            .with_retention_days(retention_days);
        let (writer, guard) = NonBlockingBuilder::default()
            .lossy(true)
            .thread_name(target.prefix())
            .finish(file);
        (
            Self {
                target,
                floor,
                writer,
            },
            guard,
        )
    }

    /// Category of this sink.
    pub fn target(&self) -> SinkTarget {
        self.target
    }
}

impl Sink for FileSink {
    fn floor(&self) -> LogLevel {
        self.floor
    }

    fn write(&self, record: &LogRecord) {
        let mut line = format::file_line(record);
        line.push('\n');
        let mut writer = self.writer.clone();
        let _ = writer.write_all(line.as_bytes());
    }
}

/// Shared view of the records captured by a [`MemorySink`].
#[derive(Debug, Clone, Default)]
pub struct CapturedRecords {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl CapturedRecords {
    /// Snapshot of every captured record, oldest first.
    pub fn all(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Records whose message equals `message`.
    pub fn with_message(&self, message: &str) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.message == message)
            .cloned()
            .collect()
    }

    /// Records at exactly `level`.
    pub fn at_level(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.level == level)
            .cloned()
            .collect()
    }

    /// Number of captured records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything captured so far.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

/// In-memory sink used by tests to inspect emitted records.
#[derive(Debug, Clone)]
pub struct MemorySink {
    floor: LogLevel,
    captured: CapturedRecords,
}

impl MemorySink {
    /// Create a sink and a handle onto what it captures.
    pub fn new(floor: LogLevel) -> (Self, CapturedRecords) {
        let captured = CapturedRecords::default();
        (
            Self {
                floor,
                captured: captured.clone(),
            },
            captured,
        )
    }
}

impl Sink for MemorySink {
    fn floor(&self) -> LogLevel {
        self.floor
    }

    fn write(&self, record: &LogRecord) {
        self.captured.records.lock().push(record.clone());
    }
}
