//! # Rotating Log Files
//!
//! Append-only file writer keyed by calendar day, with a per-file size cap
//! and age-based pruning. Files are laid out as:
//!
//! ```text
//! logs/combined-2026-10-19.log      first segment of the day
//! logs/combined-2026-10-19.1.log    after the first segment reached the cap
//! logs/combined-2026-10-19.2.log
//! ```
//!
//! The writer is driven by the `tracing_appender` worker thread, so it is
//! never called from the request path directly.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, Utc};

/// Default size cap per file segment (20 MiB).
pub const MAX_FILE_BYTES: u64 = 20 * 1024 * 1024;

/// Default retention horizon in days.
pub const RETENTION_DAYS: i64 = 14;

const DATE_FORMAT: &str = "%Y-%m-%d";

type Clock = Box<dyn Fn() -> NaiveDate + Send + Sync>;

struct Segment {
    date: NaiveDate,
    index: u32,
    file: File,
    written: u64,
}

/// A [`Write`] implementation that rotates by day and size.
pub struct RollingFile {
    dir: PathBuf,
    prefix: String,
    max_bytes: u64,
    retention_days: i64,
    today: Clock,
    current: Option<Segment>,
}

impl std::fmt::Debug for RollingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollingFile")
            .field("dir", &self.dir)
            .field("prefix", &self.prefix)
            .field("max_bytes", &self.max_bytes)
            .field("retention_days", &self.retention_days)
            .field("segment", &self.current.as_ref().map(|s| (s.date, s.index)))
            .finish()
    }
}

impl RollingFile {
    /// Create a writer for `<dir>/<prefix>-YYYY-MM-DD[.N].log` using the
    /// default cap and retention. Files are opened lazily on first write.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            max_bytes: MAX_FILE_BYTES,
            retention_days: RETENTION_DAYS,
            today: Box::new(|| Utc::now().date_naive()),
            current: None,
        }
    }

    /// Override the per-segment size cap.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Override the retention horizon.
    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }

    /// Replace the calendar source (tests drive date changes through this).
    pub fn with_clock(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Box::new(today);
        self
    }

    /// Path of the segment currently being written, if any.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.current
            .as_ref()
            .map(|s| segment_path(&self.dir, &self.prefix, s.date, s.index))
    }

    /// Delete files of this prefix whose date is older than the horizon.
    pub fn prune(&self, today: NaiveDate) -> io::Result<usize> {
        let cutoff = today - Duration::days(self.retention_days);
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(date) = file_date(&path, &self.prefix) else {
                continue;
            };
            if date < cutoff && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn segment_for(&mut self, incoming: u64) -> io::Result<&mut Segment> {
        let today = (self.today)();

        let needs_new_day = self.current.as_ref().map_or(true, |s| s.date != today);
        if needs_new_day {
            // Pruning is best-effort; a failure must not stop the write.
            let _ = self.prune(today);
            let index = latest_index(&self.dir, &self.prefix, today);
            self.current = Some(open_segment(&self.dir, &self.prefix, today, index)?);
        }

        let over_cap = self
            .current
            .as_ref()
            .map_or(false, |s| s.written > 0 && s.written + incoming > self.max_bytes);
        if over_cap {
            let next = self.current.as_ref().map_or(0, |s| s.index + 1);
            self.current = Some(open_segment(&self.dir, &self.prefix, today, next)?);
        }

        self.current
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no active log segment"))
    }
}

impl RollingFile {
    fn append(&mut self, buf: &[u8]) -> io::Result<usize> {
        let segment = self.segment_for(buf.len() as u64)?;
        segment.file.write_all(buf)?;
        segment.written += buf.len() as u64;
        Ok(buf.len())
    }

    /// Line printed on stderr when a write or rotation fails. The worker
    /// thread drops the line afterwards.
    pub fn failure_message(&self, err: &io::Error) -> String {
        format!(
            "log write to {}/{}-*.log failed, line dropped: {err}",
            self.dir.display(),
            self.prefix
        )
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf).map_err(|err| {
            eprintln!("{}", self.failure_message(&err));
            err
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.current.as_mut() {
            Some(segment) => segment.file.flush(),
            None => Ok(()),
        }
    }
}

fn segment_path(dir: &Path, prefix: &str, date: NaiveDate, index: u32) -> PathBuf {
    let date = date.format(DATE_FORMAT);
    if index == 0 {
        dir.join(format!("{prefix}-{date}.log"))
    } else {
        dir.join(format!("{prefix}-{date}.{index}.log"))
    }
}

fn open_segment(dir: &Path, prefix: &str, date: NaiveDate, index: u32) -> io::Result<Segment> {
    let path = segment_path(dir, prefix, date, index);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let written = file.metadata()?.len();
    Ok(Segment {
        date,
        index,
        file,
        written,
    })
}

/// Highest existing segment index for `date`, so a restart keeps appending
/// to the newest file of the day.
fn latest_index(dir: &Path, prefix: &str, date: NaiveDate) -> u32 {
    let mut index = 0;
    while segment_path(dir, prefix, date, index + 1).exists() {
        index += 1;
    }
    index
}

/// Parse the date embedded in `<prefix>-YYYY-MM-DD[.N].log`.
fn file_date(path: &Path, prefix: &str) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let rest = name.strip_prefix(prefix)?.strip_prefix('-')?;
    if !rest.ends_with(".log") {
        return None;
    }
    let date = rest.get(..10)?;
    NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn write_failure_is_reported_and_returned() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let mut file = RollingFile::new(&missing, "error").with_clock(|| day(19));
        let err = file.write(b"lost\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        let message = file.failure_message(&err);
        assert!(message.contains("gone"));
        assert!(message.contains("error-*.log"));
        assert!(message.contains("line dropped"));
        assert!(file.current_path().is_none());
    }

    #[test]
    fn writes_to_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = RollingFile::new(dir.path(), "combined").with_clock(|| day(19));
        file.write_all(b"{\"a\":1}\n").unwrap();
        file.flush().unwrap();

        let path = dir.path().join("combined-2026-10-19.log");
        assert_eq!(fs::read_to_string(path).unwrap(), "{\"a\":1}\n");
    }

    #[test]
    fn size_cap_starts_new_segment_same_day() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = RollingFile::new(dir.path(), "access")
            .with_max_bytes(10)
            .with_clock(|| day(19));
        file.write_all(b"12345678\n").unwrap();
        file.write_all(b"abcdefgh\n").unwrap();
        file.write_all(b"ABCDEFGH\n").unwrap();
        file.flush().unwrap();

        let first = fs::read_to_string(dir.path().join("access-2026-10-19.log")).unwrap();
        let second = fs::read_to_string(dir.path().join("access-2026-10-19.1.log")).unwrap();
        let third = fs::read_to_string(dir.path().join("access-2026-10-19.2.log")).unwrap();
        assert_eq!(first, "12345678\n");
        assert_eq!(second, "abcdefgh\n");
        assert_eq!(third, "ABCDEFGH\n");
    }

    #[test]
    fn oversized_line_is_still_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = RollingFile::new(dir.path(), "error")
            .with_max_bytes(4)
            .with_clock(|| day(19));
        file.write_all(b"0123456789\n").unwrap();
        file.flush().unwrap();
        let text = fs::read_to_string(dir.path().join("error-2026-10-19.log")).unwrap();
        assert_eq!(text, "0123456789\n");
    }

    #[test]
    fn date_change_rotates_file() {
        let dir = tempfile::tempdir().unwrap();
        let today = Arc::new(Mutex::new(day(19)));
        let clock = Arc::clone(&today);
        let mut file = RollingFile::new(dir.path(), "combined").with_clock(move || *clock.lock());

        file.write_all(b"monday\n").unwrap();
        *today.lock() = day(20);
        file.write_all(b"tuesday\n").unwrap();
        file.flush().unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("combined-2026-10-19.log")).unwrap(),
            "monday\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("combined-2026-10-20.log")).unwrap(),
            "tuesday\n"
        );
        assert_eq!(
            file.current_path().unwrap(),
            dir.path().join("combined-2026-10-20.log")
        );
    }

    #[test]
    fn reopening_appends_to_latest_segment() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("combined-2026-10-19.log"), "old\n").unwrap();
        fs::write(dir.path().join("combined-2026-10-19.1.log"), "older\n").unwrap();

        let mut file = RollingFile::new(dir.path(), "combined").with_clock(|| day(19));
        file.write_all(b"new\n").unwrap();
        file.flush().unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("combined-2026-10-19.1.log")).unwrap(),
            "older\nnew\n"
        );
    }

    #[test]
    fn prunes_files_past_retention() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("combined-2026-09-01.log"), "x").unwrap();
        fs::write(dir.path().join("combined-2026-09-01.1.log"), "x").unwrap();
        fs::write(dir.path().join("combined-2026-10-10.log"), "x").unwrap();
        fs::write(dir.path().join("error-2026-09-01.log"), "x").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let mut file = RollingFile::new(dir.path(), "combined").with_clock(|| day(19));
        file.write_all(b"line\n").unwrap();

        assert!(!dir.path().join("combined-2026-09-01.log").exists());
        assert!(!dir.path().join("combined-2026-09-01.1.log").exists());
        assert!(dir.path().join("combined-2026-10-10.log").exists());
        // Other prefixes and unrelated files are left alone.
        assert!(dir.path().join("error-2026-09-01.log").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn file_date_parses_segments() {
        let prefix = "access";
        assert_eq!(
            file_date(Path::new("access-2026-10-19.log"), prefix),
            Some(day(19))
        );
        assert_eq!(
            file_date(Path::new("access-2026-10-19.3.log"), prefix),
            Some(day(19))
        );
        assert_eq!(file_date(Path::new("access-latest.log"), prefix), None);
        assert_eq!(file_date(Path::new("access-2026-10-19.txt"), prefix), None);
    }
}
