//! Local metrics store backed by JSON-lines files
//!
//! Each record is one line appended to `cache-events.jsonl` or
//! `build-metrics.jsonl`. Lines that fail to parse are skipped so a torn
//! write from a killed process never poisons later reads.

use crate::error::{SmartCacheError, SmartCacheResult};
use crate::metrics::model::{BuildMetricSample, CacheEvent, SampleQuery};
use crate::metrics::store::MetricsStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

const CACHE_EVENTS_FILE: &str = "cache-events.jsonl";
const BUILD_METRICS_FILE: &str = "build-metrics.jsonl";

/// File-based metrics store that appends JSON lines
pub struct JsonlStore {
    dir: PathBuf,
}

impl JsonlStore {
    /// Create a store writing under `dir` (created on first write)
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    async fn append<T: Serialize>(&self, file: &str, record: &T) -> SmartCacheResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SmartCacheError::io(format!("creating {}", self.dir.display()), e))?;

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let path = self.dir.join(file);
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| SmartCacheError::io(format!("opening {}", path.display()), e))?;

        // Single write so concurrent appenders never interleave within a line
        handle
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SmartCacheError::io(format!("appending to {}", path.display()), e))?;
        handle
            .flush()
            .await
            .map_err(|e| SmartCacheError::io(format!("flushing {}", path.display()), e))
    }

    async fn read_all<T: DeserializeOwned>(&self, file: &str) -> SmartCacheResult<Vec<T>> {
        let path = self.dir.join(file);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SmartCacheError::io(format!("reading {}", path.display()), e))
            }
        };

        Ok(parse_lines(&path, &content))
    }
}

fn parse_lines<T: DeserializeOwned>(path: &Path, content: &str) -> Vec<T> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed line {} in {}: {}", idx + 1, path.display(), e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl MetricsStore for JsonlStore {
    async fn record_cache_event(&self, event: &CacheEvent) -> SmartCacheResult<()> {
        self.append(CACHE_EVENTS_FILE, event).await
    }

    async fn record_build_sample(&self, sample: &BuildMetricSample) -> SmartCacheResult<()> {
        self.append(BUILD_METRICS_FILE, sample).await
    }

    async fn cache_events(&self, since: DateTime<Utc>) -> SmartCacheResult<Vec<CacheEvent>> {
        let events: Vec<CacheEvent> = self.read_all(CACHE_EVENTS_FILE).await?;
        Ok(events.into_iter().filter(|e| e.timestamp >= since).collect())
    }

    async fn build_samples(&self, query: &SampleQuery) -> SmartCacheResult<Vec<BuildMetricSample>> {
        let samples = self.read_all(BUILD_METRICS_FILE).await?;
        Ok(query.apply(samples))
    }

    fn backend_name(&self) -> &'static str {
        "jsonl"
    }
}
