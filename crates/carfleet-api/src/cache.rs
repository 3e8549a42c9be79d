//! # Cache Collaborator
//!
//! Redis is optional at runtime: a failed connection at startup is logged
//! and the service runs without it. The health endpoint reports its state
//! but never fails because of it.

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;

/// Errors surfaced by the cache collaborator.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Error reported by the Redis client.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// PING answered with something other than `PONG`.
    #[error("unexpected PING reply: {0}")]
    UnexpectedReply(String),

    /// The connection was closed during shutdown.
    #[error("cache connection closed")]
    Closed,
}

/// Cache collaborator.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Round trip proving the cache answers.
    async fn ping(&self) -> Result<(), CacheError>;

    /// Drop the connection. Called once during shutdown.
    async fn close(&self);
}

/// Redis-backed cache using a reconnecting connection manager.
pub struct RedisCache {
    conn: Mutex<Option<ConnectionManager>>,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("open", &self.conn.lock().is_some())
            .finish()
    }
}

impl RedisCache {
    /// Connect to `url`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            conn: Mutex::new(Some(manager)),
        })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn ping(&self) -> Result<(), CacheError> {
        // Never hold the lock across the await.
        let mut conn = self.conn.lock().clone().ok_or(CacheError::Closed)?;
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(CacheError::UnexpectedReply(reply))
        }
    }

    async fn close(&self) {
        self.conn.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let err = RedisCache::connect("not-a-redis-url").await.unwrap_err();
        assert!(matches!(err, CacheError::Redis(_)));
    }
}
