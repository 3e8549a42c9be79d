//! # Log Levels
//!
//! Five severities in the order the HTTP pipeline needs them. `http` sits
//! between `info` and `debug`, so a sink with an `http` floor receives
//! request lines alongside warnings and errors but not debug chatter.

use std::fmt;
use std::str::FromStr;

use colored::Color;
use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;

/// Severity of a [`LogRecord`](crate::LogRecord).
///
/// Variants are declared in ascending severity so the derived `Ord` reads
/// naturally: `LogLevel::Error > LogLevel::Http`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose diagnostics, development only.
    Debug,
    /// One line per HTTP request or response.
    Http,
    /// Lifecycle and business events.
    Info,
    /// Recoverable anomalies.
    Warn,
    /// Failures; always routed to the error file.
    Error,
}

impl LogLevel {
    /// All levels, most severe first.
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Http,
        LogLevel::Debug,
    ];

    /// Lowercase name used in file output and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Http => "http",
            Self::Debug => "debug",
        }
    }

    /// Uppercase tag used in console output.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Http => "HTTP",
            Self::Debug => "DEBUG",
        }
    }

    /// Console color for this level.
    pub fn color(&self) -> Color {
        match self {
            Self::Error => Color::Red,
            Self::Warn => Color::Yellow,
            Self::Info => Color::Green,
            Self::Http => Color::Magenta,
            Self::Debug => Color::Blue,
        }
    }

    /// Whether a sink with floor `self` accepts a record at `level`.
    pub fn admits(&self, level: LogLevel) -> bool {
        level >= *self
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "http" => Ok(Self::Http),
            "debug" => Ok(Self::Debug),
            other => Err(TelemetryError::UnknownLevel(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_is_most_severe() {
        assert!(LogLevel::Error > LogLevel::Warn);
        assert!(LogLevel::Warn > LogLevel::Info);
        assert!(LogLevel::Info > LogLevel::Http);
        assert!(LogLevel::Http > LogLevel::Debug);
    }

    #[test]
    fn error_floor_admits_only_errors() {
        let floor = LogLevel::Error;
        assert!(floor.admits(LogLevel::Error));
        for level in [LogLevel::Warn, LogLevel::Info, LogLevel::Http, LogLevel::Debug] {
            assert!(!floor.admits(level), "{level} leaked through error floor");
        }
    }

    #[test]
    fn http_floor_excludes_debug() {
        let floor = LogLevel::Http;
        assert!(floor.admits(LogLevel::Error));
        assert!(floor.admits(LogLevel::Warn));
        assert!(floor.admits(LogLevel::Info));
        assert!(floor.admits(LogLevel::Http));
        assert!(!floor.admits(LogLevel::Debug));
    }

    #[test]
    fn debug_floor_admits_everything() {
        assert!(LogLevel::ALL.iter().all(|l| LogLevel::Debug.admits(*l)));
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("HTTP".parse::<LogLevel>().unwrap(), LogLevel::Http);
        assert_eq!(" warning ".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&LogLevel::Http).unwrap();
        assert_eq!(json, "\"http\"");
    }
}
