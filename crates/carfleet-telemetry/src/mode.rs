//! # Runtime Mode
//!
//! The mode selects the verbosity floor, the access-log template, the
//! response-body policy, and whether the access logger runs at all.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;
use crate::level::LogLevel;

/// Deployment mode of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development: everything logged, errors expose stack traces.
    #[default]
    Development,
    /// Production: `http` floor, success bodies and stack traces withheld.
    Production,
    /// Test runs: the access logger stays quiet.
    Test,
}

impl Environment {
    /// Lowercase name as reported by `/health` and `/`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }

    /// Whether the strict logging/exposure policy applies.
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Global verbosity floor for this mode.
    pub fn default_floor(&self) -> LogLevel {
        if self.is_production() {
            LogLevel::Http
        } else {
            LogLevel::Debug
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(TelemetryError::UnknownEnvironment(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_floor_is_http() {
        assert_eq!(Environment::Production.default_floor(), LogLevel::Http);
        assert_eq!(Environment::Development.default_floor(), LogLevel::Debug);
        assert_eq!(Environment::Test.default_floor(), LogLevel::Debug);
    }

    #[test]
    fn parses_known_modes() {
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Test".parse::<Environment>().unwrap(), Environment::Test);
        assert!("staging".parse::<Environment>().is_err());
    }
}
