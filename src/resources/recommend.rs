//! Memory/CPU recommendation from historical build samples
//!
//! Sizing rules:
//! - memory and CPU come from a high percentile of peak usage, never the mean
//! - OOM samples are excluded from the memory percentile; instead the result
//!   must clear the largest OOM peak by `oom_headroom`
//! - a safety margin is added, memory is rounded up to `memory_step_mb`, and
//!   both values are clamped to the platform bounds
//! - if the platform maximum cannot clear the largest OOM peak, the capped
//!   value is still returned but confidence drops to low

use crate::config::schema::{ColdStartPolicy, ResourcesConfig};
use crate::error::{SmartCacheError, SmartCacheResult};
use crate::metrics::{BuildMetricSample, BuildResult, MetricsStore, SampleQuery};
use crate::resources::stats::{percentile, round_up_to_step};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

const MAX_BRANCH_LEN: usize = 255;

/// How much to trust a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// `< min` low, `< 2 * min` medium, otherwise high
    pub fn from_samples(count: usize, min_samples: usize) -> Self {
        if count < min_samples {
            Self::Low
        } else if count < min_samples.saturating_mul(2) {
            Self::Medium
        } else {
            Self::High
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Which samples a recommendation was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Basis {
    /// The requested branch only
    Branch,
    /// Every branch (cold-start fallback)
    AllBranches,
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch => write!(f, "branch"),
            Self::AllBranches => write!(f, "all-branches"),
        }
    }
}

/// Suggested allocation for the next build of a branch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRecommendation {
    pub branch: String,
    pub memory_mb: u64,
    pub cpu_cores: u32,
    /// Heap share of `memory_mb` for JVM builds
    pub jvm_heap_mb: u64,
    pub confidence: Confidence,
    pub basis_sample_count: usize,
    pub basis: Basis,
    /// Percentile the numbers were sized at
    pub percentile: f64,
    /// Memory was raised to clear an OOM in the window
    pub oom_adjusted: bool,
    /// A platform bound cut the computed value
    pub clamped: bool,
}

/// Reject branch names before any store access
pub fn validate_branch(branch: &str) -> SmartCacheResult<()> {
    let fail = |reason: &str| {
        Err(SmartCacheError::InvalidBranch {
            name: branch.to_string(),
            reason: reason.to_string(),
        })
    };

    if branch.trim().is_empty() {
        return fail("must not be empty");
    }
    if branch.len() > MAX_BRANCH_LEN {
        return fail("longer than 255 characters");
    }
    if branch.starts_with('-') || branch.starts_with('/') {
        return fail("must not start with '-' or '/'");
    }
    if branch.contains("..") {
        return fail("must not contain '..'");
    }
    if let Some(c) = branch
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/')))
    {
        return fail(&format!("invalid character '{}'", c));
    }
    Ok(())
}

/// Recommend resources for `branch` from the samples in `store`
///
/// Reports `NoData` when no usable sample exists, including when the store
/// cannot be reached. Never invents numbers.
pub async fn recommend(
    store: &dyn MetricsStore,
    branch: &str,
    policy: &ResourcesConfig,
    now: DateTime<Utc>,
) -> SmartCacheResult<ResourceRecommendation> {
    validate_branch(branch)?;

    let mut basis = Basis::Branch;
    let mut samples = lookback_window(store, Some(branch), policy, now).await?;
    debug!("{} samples for branch {}", samples.len(), branch);

    if samples.len() < policy.min_samples && policy.cold_start == ColdStartPolicy::AllBranches {
        let wider = lookback_window(store, None, policy, now).await?;
        if wider.len() > samples.len() {
            info!(
                "Branch {} has {} samples, widening to all branches ({})",
                branch,
                samples.len(),
                wider.len()
            );
            samples = wider;
            basis = Basis::AllBranches;
        }
    }

    compute(branch, &samples, basis, policy)
}

/// Samples from the last N builds or the last N days, whichever yields more
async fn lookback_window(
    store: &dyn MetricsStore,
    branch: Option<&str>,
    policy: &ResourcesConfig,
    now: DateTime<Utc>,
) -> SmartCacheResult<Vec<BuildMetricSample>> {
    let by_count = SampleQuery {
        branch: branch.map(str::to_string),
        since: None,
        limit: Some(policy.lookback_builds),
    };
    let by_days = SampleQuery {
        branch: branch.map(str::to_string),
        since: Some(now - Duration::days(i64::from(policy.lookback_days))),
        limit: None,
    };

    let recent = store.build_samples(&by_count).await.map_err(unreachable_as_no_data)?;
    let dated = store.build_samples(&by_days).await.map_err(unreachable_as_no_data)?;

    Ok(if dated.len() > recent.len() { dated } else { recent })
}

fn unreachable_as_no_data(err: SmartCacheError) -> SmartCacheError {
    if err.is_retryable() {
        warn!("Metrics store unreachable: {}", err);
        SmartCacheError::no_data(format!("metrics store unreachable ({err})"))
    } else {
        err
    }
}

fn is_usable(sample: &BuildMetricSample) -> bool {
    sample.peak_memory_mb.is_finite()
        && sample.peak_memory_mb >= 0.0
        && sample.cpu_cores_used.is_finite()
        && sample.cpu_cores_used >= 0.0
}

/// Pure sizing over an already selected window
pub fn compute(
    branch: &str,
    samples: &[BuildMetricSample],
    basis: Basis,
    policy: &ResourcesConfig,
) -> SmartCacheResult<ResourceRecommendation> {
    let usable: Vec<&BuildMetricSample> = samples.iter().filter(|s| is_usable(s)).collect();
    if usable.is_empty() {
        return Err(SmartCacheError::no_data(format!(
            "no usable build samples for branch '{branch}'"
        )));
    }

    let margin = 1.0 + policy.safety_margin;

    // Memory that ended in an OOM is known to be insufficient
    let healthy_memory: Vec<f64> = usable
        .iter()
        .filter(|s| s.result != BuildResult::Oom)
        .map(|s| s.peak_memory_mb)
        .collect();
    let max_oom_peak = usable
        .iter()
        .filter(|s| s.result == BuildResult::Oom)
        .map(|s| s.peak_memory_mb)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

    let mut memory = percentile(&healthy_memory, policy.percentile).unwrap_or(0.0) * margin;
    let mut oom_adjusted = false;
    if let Some(peak) = max_oom_peak {
        let floor = peak * (1.0 + policy.oom_headroom);
        if floor > memory {
            memory = floor;
            oom_adjusted = true;
        }
    }

    let mut memory_mb = round_up_to_step(memory, policy.memory_step_mb);
    if let Some(peak) = max_oom_peak {
        // Zero headroom still has to land strictly above the OOM peak
        if memory_mb as f64 <= peak {
            memory_mb = round_up_to_step(peak + 1.0, policy.memory_step_mb);
            oom_adjusted = true;
        }
    }

    let cpu_values: Vec<f64> = usable.iter().map(|s| s.cpu_cores_used).collect();
    let cpu = percentile(&cpu_values, policy.percentile).unwrap_or(0.0) * margin;
    let cpu_cores = u32::try_from(round_up_to_step(cpu, 1)).unwrap_or(u32::MAX);

    let clamped_memory = memory_mb.clamp(policy.min_memory_mb, policy.max_memory_mb);
    let clamped_cpu = cpu_cores.clamp(policy.min_cpu_cores, policy.max_cpu_cores);
    let clamped = clamped_memory != memory_mb || clamped_cpu != cpu_cores;
    if clamped {
        debug!(
            "Clamped {}MB/{} cores to {}MB/{} cores",
            memory_mb, cpu_cores, clamped_memory, clamped_cpu
        );
    }

    let mut confidence = Confidence::from_samples(usable.len(), policy.min_samples);
    if let Some(peak) = max_oom_peak {
        if clamped_memory as f64 <= peak {
            warn!(
                "OOM peak {:.0}MB on branch {} is at or above the {}MB maximum; recommendation is known to be insufficient",
                peak, branch, policy.max_memory_mb
            );
            confidence = Confidence::Low;
        }
    }

    Ok(ResourceRecommendation {
        branch: branch.to_string(),
        memory_mb: clamped_memory,
        cpu_cores: clamped_cpu,
        jvm_heap_mb: (clamped_memory as f64 * policy.jvm_heap_ratio).floor() as u64,
        confidence,
        basis_sample_count: usable.len(),
        basis,
        percentile: policy.percentile,
        oom_adjusted,
        clamped,
    })
}
