//! Cache effectiveness: hit/miss tracking and rolling analysis
//!
//! `track` is a single append. All aggregation happens in `analyze`, at read
//! time, so parallel build agents never contend on a shared counter.

use crate::error::SmartCacheResult;
use crate::metrics::{BuildMetricSample, CacheEvent, CacheOutcome, MetricsStore, SampleQuery};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Aggregated effectiveness over a window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectivenessReport {
    pub window_days: u32,
    pub hits: usize,
    pub misses: usize,
    /// hits + misses
    pub sample_count: usize,
    /// `None` when there are no events: "no data" is not "always misses"
    pub hit_rate: Option<f64>,
    /// Mean duration of builds that hit the cache (joined by build id)
    pub avg_duration_with_hit: Option<f64>,
    /// Mean duration of builds that missed
    pub avg_duration_with_miss: Option<f64>,
    /// Events that found a matching build sample
    pub joined_builds: usize,
}

impl EffectivenessReport {
    /// Seconds saved per build on a hit, when both averages exist
    pub fn saved_per_hit(&self) -> Option<f64> {
        Some(self.avg_duration_with_miss? - self.avg_duration_with_hit?)
    }
}

/// Append one hit/miss event for `build_id`
pub async fn track(
    store: &dyn MetricsStore,
    build_id: &str,
    fingerprint: &str,
    outcome: CacheOutcome,
    now: DateTime<Utc>,
) -> SmartCacheResult<CacheEvent> {
    let event = CacheEvent {
        build_id: build_id.to_string(),
        fingerprint: fingerprint.to_string(),
        outcome,
        timestamp: now,
    };
    store.record_cache_event(&event).await?;
    debug!("Tracked {} for build {}", outcome, build_id);
    Ok(event)
}

/// Read the last `window_days` of events and samples and aggregate them
pub async fn analyze(
    store: &dyn MetricsStore,
    window_days: u32,
    now: DateTime<Utc>,
) -> SmartCacheResult<EffectivenessReport> {
    let since = now - Duration::days(i64::from(window_days));
    let events = store.cache_events(since).await?;
    let samples = store
        .build_samples(&SampleQuery {
            since: Some(since),
            ..Default::default()
        })
        .await?;

    Ok(aggregate(window_days, &events, &samples))
}

/// Pure aggregation; every event counts, in any timestamp order
pub fn aggregate(
    window_days: u32,
    events: &[CacheEvent],
    samples: &[BuildMetricSample],
) -> EffectivenessReport {
    let durations: HashMap<&str, f64> = samples
        .iter()
        .map(|s| (s.build_id.as_str(), s.duration_seconds))
        .collect();

    let mut hits = 0usize;
    let mut misses = 0usize;
    let mut hit_durations = Vec::new();
    let mut miss_durations = Vec::new();

    for event in events {
        let duration = durations.get(event.build_id.as_str()).copied();
        match event.outcome {
            CacheOutcome::Hit => {
                hits += 1;
                hit_durations.extend(duration);
            }
            CacheOutcome::Miss => {
                misses += 1;
                miss_durations.extend(duration);
            }
        }
    }

    let sample_count = hits + misses;
    EffectivenessReport {
        window_days,
        hits,
        misses,
        sample_count,
        hit_rate: (sample_count > 0).then(|| hits as f64 / sample_count as f64),
        avg_duration_with_hit: average(&hit_durations),
        avg_duration_with_miss: average(&miss_durations),
        joined_builds: hit_durations.len() + miss_durations.len(),
    }
}

fn average(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::model::fixtures::{event, sample};
    use crate::metrics::{BuildResult, JsonlStore};
    use tempfile::TempDir;

    fn timed(build_id: &str, duration_seconds: f64) -> BuildMetricSample {
        BuildMetricSample {
            duration_seconds,
            ..sample(build_id, "main", 1000.0, BuildResult::Success, 1)
        }
    }

    #[tokio::test]
    async fn hit_rate_is_exact_ratio() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::new(dir.path().to_path_buf());
        let now = Utc::now();

        for i in 0..3 {
            track(&store, &format!("h{i}"), "fp", CacheOutcome::Hit, now).await.unwrap();
        }
        for i in 0..2 {
            track(&store, &format!("m{i}"), "fp", CacheOutcome::Miss, now).await.unwrap();
        }

        let report = analyze(&store, 7, now).await.unwrap();
        assert_eq!(report.hits, 3);
        assert_eq!(report.misses, 2);
        assert_eq!(report.hit_rate, Some(3.0 / 5.0));
    }

    #[tokio::test]
    async fn empty_window_is_undefined_not_zero() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::new(dir.path().to_path_buf());

        let report = analyze(&store, 7, Utc::now()).await.unwrap();
        assert_eq!(report.sample_count, 0);
        assert_eq!(report.hit_rate, None);
    }

    #[test]
    fn all_misses_is_zero_not_undefined() {
        let events = vec![event("1", CacheOutcome::Miss, 1)];
        let report = aggregate(7, &events, &[]);
        assert_eq!(report.hit_rate, Some(0.0));
    }

    #[test]
    fn joins_durations_by_build_id() {
        let events = vec![
            event("a", CacheOutcome::Hit, 3),
            event("b", CacheOutcome::Hit, 2),
            event("c", CacheOutcome::Miss, 1),
            event("orphan", CacheOutcome::Miss, 1),
        ];
        let samples = vec![timed("c", 600.0), timed("a", 100.0), timed("b", 200.0)];

        let report = aggregate(7, &events, &samples);

        assert_eq!(report.avg_duration_with_hit, Some(150.0));
        assert_eq!(report.avg_duration_with_miss, Some(600.0));
        assert_eq!(report.joined_builds, 3);
        assert_eq!(report.saved_per_hit(), Some(450.0));
        assert_eq!(report.sample_count, 4);
    }

    #[tokio::test]
    async fn analyze_respects_window() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::new(dir.path().to_path_buf());
        store.record_cache_event(&event("new", CacheOutcome::Hit, 1)).await.unwrap();
        store.record_cache_event(&event("old", CacheOutcome::Miss, 24 * 30)).await.unwrap();

        let report = analyze(&store, 7, Utc::now()).await.unwrap();
        assert_eq!(report.sample_count, 1);
        assert_eq!(report.hit_rate, Some(1.0));
    }
}
