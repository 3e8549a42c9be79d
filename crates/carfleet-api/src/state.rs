//! # Application State
//!
//! Shared state passed to handlers and middleware through the `State`
//! extractor. Every collaborator is constructed in `main` and injected
//! here; nothing in the request path reaches for a global.

use std::sync::Arc;
use std::time::Instant;

use carfleet_telemetry::{Environment, LogRouter};

use crate::cache::Cache;
use crate::config::AppConfig;
use crate::middleware::access_log::AccessFormat;
use crate::store::Store;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Runtime configuration.
    pub config: Arc<AppConfig>,
    /// Log router shared by the whole pipeline.
    pub log: Arc<LogRouter>,
    /// Persistent store.
    pub store: Arc<dyn Store>,
    /// Cache, when one connected at startup.
    pub cache: Option<Arc<dyn Cache>>,
    /// Access-log template for the runtime mode.
    pub access_format: Arc<AccessFormat>,
    /// Process start, for uptime reporting.
    pub started_at: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("log", &self.log)
            .field("cache", &self.cache.as_ref().map(|_| "[connected]"))
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Assemble state without a cache.
    pub fn new(config: AppConfig, log: Arc<LogRouter>, store: Arc<dyn Store>) -> Self {
        let access_format = Arc::new(AccessFormat::for_environment(config.environment));
        Self {
            config: Arc::new(config),
            log,
            store,
            cache: None,
            access_format,
            started_at: Instant::now(),
        }
    }

    /// Attach a cache.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Runtime mode.
    pub fn environment(&self) -> Environment {
        self.config.environment
    }

    /// Seconds since the state was assembled.
    pub fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}
