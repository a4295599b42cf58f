//! PostgreSQL metrics store via the `psql` CLI
//!
//! The schema is owned by the pipeline's database; this backend only
//! inserts into and selects from:
//!
//! - `build_metrics(build_id, branch, duration_seconds, peak_memory_mb,
//!   cpu_cores_used, result, recorded_at)`
//! - `cache_events(build_id, fingerprint, outcome, recorded_at)`

use crate::config::schema::MetricsConfig;
use crate::error::{SmartCacheError, SmartCacheResult};
use crate::metrics::model::{BuildMetricSample, CacheEvent, SampleQuery};
use crate::metrics::store::MetricsStore;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Metrics store that shells out to `psql`
pub struct PsqlStore {
    config: MetricsConfig,
    timeout: Duration,
}

impl PsqlStore {
    /// Create a store; no connection is made until the first query
    pub fn new(config: MetricsConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    fn connection_args(&self) -> Vec<String> {
        vec![
            "-X".to_string(),
            "-A".to_string(),
            "-t".to_string(),
            "-q".to_string(),
            "-F".to_string(),
            "\t".to_string(),
            "-v".to_string(),
            "ON_ERROR_STOP=1".to_string(),
            "-h".to_string(),
            self.config.host.clone(),
            "-p".to_string(),
            self.config.port.to_string(),
            "-U".to_string(),
            self.config.user.clone(),
            "-d".to_string(),
            self.config.database.clone(),
        ]
    }

    /// Run one SQL statement and return its unaligned, tuples-only output
    async fn exec(&self, sql: &str) -> SmartCacheResult<String> {
        debug!("psql: {}", sql);

        let mut command = Command::new(&self.config.psql_path);
        command
            .args(self.connection_args())
            .arg("-c")
            .arg(sql)
            .env("PGCONNECT_TIMEOUT", self.timeout.as_secs().max(1).to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref password) = self.config.password {
            command.env("PGPASSWORD", password);
        }

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(SmartCacheError::MetricsUnavailable(format!(
                    "{} not found on PATH",
                    self.config.psql_path
                )))
            }
            Ok(Err(e)) => return Err(SmartCacheError::command_failed("psql", e)),
            Err(_) => {
                return Err(SmartCacheError::Timeout {
                    operation: "psql query".to_string(),
                    after: self.timeout,
                })
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(SmartCacheError::MetricsUnavailable(stderr.trim().to_string()))
        }
    }
}

#[async_trait]
impl MetricsStore for PsqlStore {
    async fn record_cache_event(&self, event: &CacheEvent) -> SmartCacheResult<()> {
        self.exec(&insert_cache_event_sql(event)).await.map(|_| ())
    }

    async fn record_build_sample(&self, sample: &BuildMetricSample) -> SmartCacheResult<()> {
        self.exec(&insert_build_sample_sql(sample)).await.map(|_| ())
    }

    async fn cache_events(&self, since: DateTime<Utc>) -> SmartCacheResult<Vec<CacheEvent>> {
        let stdout = self.exec(&select_cache_events_sql(since)).await?;
        Ok(stdout.lines().filter_map(parse_cache_event_row).collect())
    }

    async fn build_samples(&self, query: &SampleQuery) -> SmartCacheResult<Vec<BuildMetricSample>> {
        let stdout = self.exec(&select_build_samples_sql(query)).await?;
        Ok(stdout.lines().filter_map(parse_build_sample_row).collect())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

/// Quote a string as a SQL literal
fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn timestamp_literal(ts: DateTime<Utc>) -> String {
    format!("to_timestamp({})", ts.timestamp())
}

fn insert_cache_event_sql(event: &CacheEvent) -> String {
    format!(
        "INSERT INTO cache_events (build_id, fingerprint, outcome, recorded_at) VALUES ({}, {}, {}, {})",
        sql_literal(&event.build_id),
        sql_literal(&event.fingerprint),
        sql_literal(event.outcome.as_str()),
        timestamp_literal(event.timestamp),
    )
}

fn insert_build_sample_sql(sample: &BuildMetricSample) -> String {
    format!(
        "INSERT INTO build_metrics (build_id, branch, duration_seconds, peak_memory_mb, cpu_cores_used, result, recorded_at) \
         VALUES ({}, {}, {}, {}, {}, {}, {})",
        sql_literal(&sample.build_id),
        sql_literal(&sample.branch),
        sample.duration_seconds,
        sample.peak_memory_mb,
        sample.cpu_cores_used,
        sql_literal(sample.result.as_str()),
        timestamp_literal(sample.timestamp),
    )
}

fn select_cache_events_sql(since: DateTime<Utc>) -> String {
    format!(
        "SELECT build_id, fingerprint, outcome, extract(epoch FROM recorded_at)::bigint \
         FROM cache_events WHERE recorded_at >= {}",
        timestamp_literal(since)
    )
}

fn select_build_samples_sql(query: &SampleQuery) -> String {
    let mut sql = String::from(
        "SELECT build_id, branch, duration_seconds, peak_memory_mb, cpu_cores_used, result, \
         extract(epoch FROM recorded_at)::bigint FROM build_metrics WHERE true",
    );
    if let Some(ref branch) = query.branch {
        sql.push_str(&format!(" AND branch = {}", sql_literal(branch)));
    }
    if let Some(since) = query.since {
        sql.push_str(&format!(" AND recorded_at >= {}", timestamp_literal(since)));
    }
    sql.push_str(" ORDER BY recorded_at DESC");
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    sql
}

fn parse_epoch(field: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = field.trim().parse().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

fn parse_cache_event_row(line: &str) -> Option<CacheEvent> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [build_id, fingerprint, outcome, recorded_at] = fields.as_slice() else {
        if !line.trim().is_empty() {
            warn!("Skipping malformed cache_events row: {}", line);
        }
        return None;
    };

    Some(CacheEvent {
        build_id: build_id.to_string(),
        fingerprint: fingerprint.to_string(),
        outcome: outcome.parse().ok()?,
        timestamp: parse_epoch(recorded_at)?,
    })
}

fn parse_build_sample_row(line: &str) -> Option<BuildMetricSample> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [build_id, branch, duration, memory, cpu, result, recorded_at] = fields.as_slice() else {
        if !line.trim().is_empty() {
            warn!("Skipping malformed build_metrics row: {}", line);
        }
        return None;
    };

    Some(BuildMetricSample {
        build_id: build_id.to_string(),
        branch: branch.to_string(),
        duration_seconds: duration.parse().ok()?,
        peak_memory_mb: memory.parse().ok()?,
        cpu_cores_used: cpu.parse().ok()?,
        result: result.parse().ok()?,
        timestamp: parse_epoch(recorded_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::model::{BuildResult, CacheOutcome};

    #[test]
    fn literals_escape_quotes() {
        assert_eq!(sql_literal("main"), "'main'");
        assert_eq!(sql_literal("o'brien"), "'o''brien'");
        assert_eq!(sql_literal("x'; DROP TABLE build_metrics; --"), "'x''; DROP TABLE build_metrics; --'");
    }

    #[test]
    fn sample_query_sql_includes_filters() {
        let query = SampleQuery {
            branch: Some("release/1.2".to_string()),
            since: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            limit: Some(20),
        };
        let sql = select_build_samples_sql(&query);

        assert!(sql.contains("AND branch = 'release/1.2'"));
        assert!(sql.contains("recorded_at >= to_timestamp(1700000000)"));
        assert!(sql.ends_with("ORDER BY recorded_at DESC LIMIT 20"));
    }

    #[test]
    fn unfiltered_query_has_no_limit() {
        let sql = select_build_samples_sql(&SampleQuery::default());
        assert!(!sql.contains("branch ="));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn insert_event_sql_shape() {
        let event = CacheEvent {
            build_id: "build-7".to_string(),
            fingerprint: "ab".repeat(32),
            outcome: CacheOutcome::Hit,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };
        let sql = insert_cache_event_sql(&event);
        assert!(sql.starts_with("INSERT INTO cache_events"));
        assert!(sql.contains("'build-7'"));
        assert!(sql.contains("'hit'"));
        assert!(sql.contains("to_timestamp(1700000000)"));
    }

    #[test]
    fn parses_event_row() {
        let event = parse_cache_event_row("b1\tdeadbeef\tmiss\t1700000000").unwrap();
        assert_eq!(event.build_id, "b1");
        assert_eq!(event.outcome, CacheOutcome::Miss);
        assert_eq!(event.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn parses_sample_row() {
        let sample =
            parse_build_sample_row("b2\tmain\t412.5\t2048\t3.5\toom\t1700000000").unwrap();
        assert_eq!(sample.branch, "main");
        assert_eq!(sample.peak_memory_mb, 2048.0);
        assert_eq!(sample.result, BuildResult::Oom);
    }

    #[test]
    fn rejects_malformed_rows() {
        assert!(parse_cache_event_row("").is_none());
        assert!(parse_cache_event_row("b1\tdeadbeef\tmaybe\t1700000000").is_none());
        assert!(parse_build_sample_row("b2\tmain\tnot-a-number\t1\t1\tsuccess\t1").is_none());
    }

    #[tokio::test]
    async fn missing_psql_binary_is_unavailable() {
        let config = MetricsConfig {
            psql_path: "smartcache-test-no-such-psql".to_string(),
            ..Default::default()
        };
        let store = PsqlStore::new(config, Duration::from_secs(2));

        let err = store.build_samples(&SampleQuery::default()).await.unwrap_err();
        assert!(matches!(err, SmartCacheError::MetricsUnavailable(_)));
    }
}
