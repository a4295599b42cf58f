//! Metrics store abstraction
//!
//! Provides a trait for telemetry persistence that can be implemented by
//! different backends (local JSON lines, PostgreSQL via `psql`).

use crate::config::schema::{MetricsBackend, MetricsConfig};
use crate::config::ConfigManager;
use crate::error::SmartCacheResult;
use crate::metrics::jsonl::JsonlStore;
use crate::metrics::model::{BuildMetricSample, CacheEvent, SampleQuery};
use crate::metrics::psql::PsqlStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

/// Append-only telemetry store
///
/// Writes are plain inserts so parallel build agents never coordinate;
/// every aggregate is computed at read time.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Append one cache hit/miss event
    async fn record_cache_event(&self, event: &CacheEvent) -> SmartCacheResult<()>;

    /// Append one build sample
    async fn record_build_sample(&self, sample: &BuildMetricSample) -> SmartCacheResult<()>;

    /// All cache events at or after `since`
    async fn cache_events(&self, since: DateTime<Utc>) -> SmartCacheResult<Vec<CacheEvent>>;

    /// Build samples matching `query`, newest first
    async fn build_samples(&self, query: &SampleQuery) -> SmartCacheResult<Vec<BuildMetricSample>>;

    /// Backend name for display
    fn backend_name(&self) -> &'static str;
}

/// Create the configured metrics store
pub fn open_store(config: &MetricsConfig) -> Box<dyn MetricsStore> {
    match config.backend {
        MetricsBackend::Jsonl => {
            let dir = config
                .data_dir
                .clone()
                .unwrap_or_else(ConfigManager::metrics_dir);
            debug!("Using JSONL metrics store at {}", dir.display());
            Box::new(JsonlStore::new(dir))
        }
        MetricsBackend::Postgres => {
            debug!(
                "Using PostgreSQL metrics store {}@{}:{}/{}",
                config.user, config.host, config.port, config.database
            );
            Box::new(PsqlStore::new(
                config.clone(),
                Duration::from_secs(config.query_timeout_secs),
            ))
        }
    }
}
