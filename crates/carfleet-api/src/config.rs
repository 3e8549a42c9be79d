//! # Service Configuration
//!
//! Read once at startup from the process environment. Every value except
//! `DATABASE_URL` has a default.
//!
//! | Variable                | Default                  |
//! |-------------------------|--------------------------|
//! | `APP_ENV`               | `development`            |
//! | `PORT`                  | `3000`                   |
//! | `DATABASE_URL`          | required                 |
//! | `REDIS_URL`             | `redis://127.0.0.1:6379` |
//! | `LOG_DIR`               | `logs`                   |
//! | `LOG_LEVEL`             | mode default             |
//! | `SHUTDOWN_TIMEOUT_SECS` | `10`                     |
//! | `REQUEST_TIMEOUT_SECS`  | `30`                     |

use std::path::PathBuf;
use std::time::Duration;

use carfleet_telemetry::{Environment, LogLevel, RouterConfig, TelemetryError};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;
/// Default cache URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
/// Default log directory.
pub const DEFAULT_LOG_DIR: &str = "logs";
/// Default drain budget on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime configuration.
///
/// Custom `Debug` implementation redacts the connection URLs, which may
/// carry credentials.
#[derive(Clone)]
pub struct AppConfig {
    /// Runtime mode.
    pub environment: Environment,
    /// Listen port.
    pub port: u16,
    /// Postgres connection URL.
    pub database_url: String,
    /// Redis connection URL.
    pub redis_url: String,
    /// Directory for rotating log files.
    pub log_dir: PathBuf,
    /// Console floor override.
    pub log_level: Option<LogLevel>,
    /// How long in-flight requests may drain after a shutdown signal.
    pub shutdown_timeout: Duration,
    /// Budget for a single request.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("environment", &self.environment)
            .field("port", &self.port)
            .field("database_url", &"[REDACTED]")
            .field("redis_url", &"[REDACTED]")
            .field("log_dir", &self.log_dir)
            .field("log_level", &self.log_level)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match var("APP_ENV") {
            Some(raw) => raw.parse().map_err(ConfigError::Telemetry)?,
            None => Environment::default(),
        };
        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let log_level = var("LOG_LEVEL")
            .map(|raw| raw.parse::<LogLevel>())
            .transpose()
            .map_err(ConfigError::Telemetry)?;

        Ok(Self {
            environment,
            port: parse_or("PORT", var("PORT"), DEFAULT_PORT)?,
            database_url,
            redis_url: var("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            log_dir: var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            log_level,
            shutdown_timeout: parse_or(
                "SHUTDOWN_TIMEOUT_SECS",
                var("SHUTDOWN_TIMEOUT_SECS"),
                DEFAULT_SHUTDOWN_TIMEOUT.as_secs(),
            )
            .map(Duration::from_secs)?,
            request_timeout: parse_or(
                "REQUEST_TIMEOUT_SECS",
                var("REQUEST_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT.as_secs(),
            )
            .map(Duration::from_secs)?,
        })
    }

    /// Configuration for tests: the given mode, a placeholder database URL,
    /// and logs under `target/`.
    pub fn for_tests(environment: Environment) -> Self {
        Self {
            environment,
            port: 0,
            database_url: "postgres://localhost/carfleet_test".to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            log_dir: PathBuf::from("target/test-logs"),
            log_level: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Settings for the log router.
    pub fn router_config(&self) -> RouterConfig {
        let mut config = RouterConfig::new(self.environment, &self.log_dir);
        config.console_floor = self.log_level;
        config
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value: raw.clone(),
        }),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is absent or blank.
    #[error("{0} environment variable is required")]
    Missing(&'static str),
    /// A variable could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },
    /// `APP_ENV` or `LOG_LEVEL` did not name a known mode or level.
    #[error(transparent)]
    Telemetry(TelemetryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config =
            AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://db/fleet")])).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.log_level, None);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/fleet"),
            ("APP_ENV", "production"),
            ("PORT", "8081"),
            ("LOG_DIR", "/var/log/carfleet"),
            ("LOG_LEVEL", "warn"),
            ("REQUEST_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.port, 8081);
        assert_eq!(config.log_level, Some(LogLevel::Warn));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.router_config().console_floor, Some(LogLevel::Warn));
    }

    #[test]
    fn database_url_is_required() {
        let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/fleet"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PORT"), "{err}");

        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/fleet"),
            ("APP_ENV", "staging"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Telemetry(_)));
    }

    #[test]
    fn debug_redacts_urls() {
        let mut config = AppConfig::for_tests(Environment::Test);
        config.database_url = "postgres://fleet:s3cret@db/fleet".to_string();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
