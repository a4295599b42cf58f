//! Telemetry records shared by all metrics backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a build found a usable cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOutcome {
    Hit,
    Miss,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
        }
    }
}

impl fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hit" => Ok(Self::Hit),
            "miss" => Ok(Self::Miss),
            other => Err(format!("unknown cache outcome '{other}'")),
        }
    }
}

/// One hit/miss record per build. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEvent {
    pub build_id: String,
    pub fingerprint: String,
    pub outcome: CacheOutcome,
    pub timestamp: DateTime<Utc>,
}

/// Final result of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildResult {
    Success,
    Failure,
    /// Killed for exceeding its memory limit
    Oom,
}

impl BuildResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Oom => "oom",
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "oom" => Ok(Self::Oom),
            other => Err(format!("unknown build result '{other}'")),
        }
    }
}

/// Telemetry of one completed build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildMetricSample {
    pub build_id: String,
    pub branch: String,
    pub duration_seconds: f64,
    pub peak_memory_mb: f64,
    pub cpu_cores_used: f64,
    pub result: BuildResult,
    pub timestamp: DateTime<Utc>,
}

/// Filter for reading build samples; results come back newest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleQuery {
    /// Restrict to one branch (`None` = all branches)
    pub branch: Option<String>,
    /// Only samples at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Keep at most this many of the newest samples
    pub limit: Option<usize>,
}

impl SampleQuery {
    /// Apply the query to an in-memory set of samples
    ///
    /// Input order does not matter; concurrent writers may have appended
    /// out of timestamp order.
    pub fn apply(&self, samples: Vec<BuildMetricSample>) -> Vec<BuildMetricSample> {
        let mut selected: Vec<_> = samples
            .into_iter()
            .filter(|s| self.branch.as_deref().is_none_or(|b| s.branch == b))
            .filter(|s| self.since.is_none_or(|since| s.timestamp >= since))
            .collect();

        selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}
