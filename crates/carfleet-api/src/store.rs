//! # Persistent Store
//!
//! The service talks to Postgres through the [`Store`] trait so the health
//! probes and tests can swap in a fake. [`StoreError`] is the collaborator
//! error the error classifier understands: unique violations, missing rows
//! and constraint failures each map to their own client-facing message.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::error::ErrorKind;
use sqlx::postgres::{PgDatabaseError, PgPool, PgPoolOptions};

/// SQLSTATE for `unique_violation`.
pub const UNIQUE_VIOLATION: &str = "23505";

/// Errors surfaced by the store collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated on {}", .fields.join(", "))]
    UniqueViolation {
        /// Driver error code.
        code: String,
        /// Columns covered by the constraint.
        fields: Vec<String>,
    },

    /// The query expected a row and found none.
    #[error("record not found")]
    NotFound,

    /// A not-null, check or foreign-key constraint rejected the write.
    #[error("{message}")]
    Validation {
        /// Driver error code.
        code: String,
        /// Driver message.
        message: String,
    },

    /// The database could not be reached.
    #[error("database unavailable: {0}")]
    Unavailable(String),

    /// Any other driver failure.
    #[error("database error: {0}")]
    Other(String),
}

impl StoreError {
    /// Driver error code, when the driver supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::UniqueViolation { code, .. } | Self::Validation { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Structured detail logged next to the code.
    pub fn meta(&self) -> Value {
        match self {
            Self::UniqueViolation { fields, .. } => json!({ "target": fields }),
            Self::Validation { message, .. } => json!({ "message": message }),
            _ => Value::Null,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
                match db.kind() {
                    ErrorKind::UniqueViolation => {
                        let detail = db
                            .try_downcast_ref::<PgDatabaseError>()
                            .and_then(|pg| pg.detail())
                            .and_then(key_columns);
                        let fields = detail
                            .or_else(|| db.constraint().map(|c| vec![c.to_string()]))
                            .unwrap_or_default();
                        Self::UniqueViolation { code, fields }
                    }
                    ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
                    | ErrorKind::ForeignKeyViolation => Self::Validation {
                        code,
                        message: db.message().to_string(),
                    },
                    _ => Self::Other(db.message().to_string()),
                }
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Self::Unavailable(err.to_string()),
            other => Self::Other(other.to_string()),
        }
    }
}

/// Column names from a Postgres detail such as
/// `Key (email)=(ada@example.com) already exists.`
fn key_columns(detail: &str) -> Option<Vec<String>> {
    let rest = detail.strip_prefix("Key (")?;
    let end = rest.find(")=")?;
    let columns: Vec<String> = rest[..end]
        .split(',')
        .map(|c| c.trim().trim_matches('"').to_string())
        .filter(|c| !c.is_empty())
        .collect();
    (!columns.is_empty()).then_some(columns)
}

/// Persistent store collaborator.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap round trip proving the store answers queries.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Release connections. Called once during shutdown.
    async fn close(&self);
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a pool to `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
