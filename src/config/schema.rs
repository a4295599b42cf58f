//! Configuration schema for smartcache
//!
//! Configuration is stored at `~/.config/smartcache/config.toml`, optionally
//! overlaid by a project-local `.smartcache.toml`.

use crate::cache::ManifestPreset;
use crate::error::{SmartCacheError, SmartCacheResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Dependency cache settings
    pub cache: CacheConfig,

    /// Telemetry store settings
    pub metrics: MetricsConfig,

    /// Resource recommendation policy
    pub resources: ResourcesConfig,
}

impl Config {
    /// Apply environment overrides through `lookup`
    ///
    /// Callers pass `|k| std::env::var(k).ok()`; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F) -> SmartCacheResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("SMARTCACHE_CACHE_DIR") {
            self.cache.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("SMARTCACHE_PROJECT_DIR") {
            self.general.project_dir = Some(PathBuf::from(dir));
        }
        if let Some(backend) = lookup("SMARTCACHE_METRICS_BACKEND") {
            self.metrics.backend = match backend.as_str() {
                "jsonl" => MetricsBackend::Jsonl,
                "postgres" => MetricsBackend::Postgres,
                other => {
                    return Err(SmartCacheError::InvalidArgument(format!(
                        "SMARTCACHE_METRICS_BACKEND must be 'jsonl' or 'postgres', got '{other}'"
                    )))
                }
            };
        }
        if let Some(host) = lookup("SMARTCACHE_DB_HOST") {
            self.metrics.host = host;
        }
        if let Some(port) = lookup("SMARTCACHE_DB_PORT") {
            self.metrics.port = port.parse().map_err(|_| {
                SmartCacheError::InvalidArgument(format!("SMARTCACHE_DB_PORT is not a port: {port}"))
            })?;
        }
        if let Some(name) = lookup("SMARTCACHE_DB_NAME") {
            self.metrics.database = name;
        }
        if let Some(user) = lookup("SMARTCACHE_DB_USER") {
            self.metrics.user = user;
        }
        if let Some(password) = lookup("SMARTCACHE_DB_PASSWORD") {
            self.metrics.password = Some(password);
        }
        Ok(())
    }

    /// Reject policy values that would make recommendations meaningless
    pub fn validate(&self) -> SmartCacheResult<()> {
        let r = &self.resources;
        let invalid = |msg: &str| Err(SmartCacheError::InvalidArgument(msg.to_string()));

        if !(r.percentile > 0.0 && r.percentile <= 100.0) {
            return invalid("resources.percentile must be in (0, 100]");
        }
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;
        if !non_negative(r.safety_margin) || !non_negative(r.oom_headroom) {
            return invalid(
                "resources.safety_margin and resources.oom_headroom must be finite and >= 0",
            );
        }
        if r.min_samples == 0 {
            return invalid("resources.min_samples must be at least 1");
        }
        if r.memory_step_mb == 0 {
            return invalid("resources.memory_step_mb must be at least 1");
        }
        if r.min_memory_mb > r.max_memory_mb || r.min_cpu_cores > r.max_cpu_cores {
            return invalid("resources minimums must not exceed maximums");
        }
        if !(r.jvm_heap_ratio > 0.0 && r.jvm_heap_ratio <= 1.0) {
            return invalid("resources.jvm_heap_ratio must be in (0, 1]");
        }
        if self.cache.warm_command.is_empty() {
            return invalid("cache.warm_command must not be empty");
        }
        Ok(())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Project directory (default: current directory)
    pub project_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            project_dir: None,
        }
    }
}

/// Dependency cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root (default: `~/.cache/smartcache`)
    pub cache_dir: Option<PathBuf>,

    /// Build tool preset used when `manifests` is empty
    pub preset: ManifestPreset,

    /// Explicit ordered manifest list, relative to the project dir
    pub manifests: Vec<String>,

    /// Command that downloads dependencies (program first)
    pub warm_command: Vec<String>,

    /// Env var pointed at the staging dir while warming
    pub warm_env_var: String,

    /// Timeout for the warm command
    pub warm_timeout_secs: u64,

    /// How long warm/invalidate wait for the cache lock
    pub lock_timeout_secs: u64,

    /// File extensions counted as dependency artifacts (empty = all files)
    pub artifact_extensions: Vec<String>,
}

impl CacheConfig {
    /// Manifests to fingerprint, in declared order
    pub fn manifest_list(&self) -> Vec<String> {
        if self.manifests.is_empty() {
            self.preset.manifests().iter().map(|m| m.to_string()).collect()
        } else {
            self.manifests.clone()
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            preset: ManifestPreset::Gradle,
            manifests: vec![],
            warm_command: vec![
                "gradle".to_string(),
                "dependencies".to_string(),
                "--no-daemon".to_string(),
                "--quiet".to_string(),
            ],
            warm_env_var: "GRADLE_USER_HOME".to_string(),
            warm_timeout_secs: 1800,
            lock_timeout_secs: 300,
            artifact_extensions: vec!["jar".to_string(), "aar".to_string(), "pom".to_string()],
        }
    }
}

/// Where telemetry lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsBackend {
    /// JSON-lines files on local disk
    #[default]
    Jsonl,
    /// PostgreSQL via the `psql` client
    Postgres,
}

/// Telemetry store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub backend: MetricsBackend,

    /// JSONL directory (default: state dir)
    pub data_dir: Option<PathBuf>,

    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,

    /// Prefer SMARTCACHE_DB_PASSWORD over storing this in a file
    pub password: Option<String>,

    /// `psql` binary to run
    pub psql_path: String,

    /// Timeout for each repository query
    pub query_timeout_secs: u64,

    /// Default window for `analyze`
    pub analyze_window_days: u32,

    /// Fail `track` when the store is unreachable
    pub strict_track: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            backend: MetricsBackend::Jsonl,
            data_dir: None,
            host: "localhost".to_string(),
            port: 5432,
            database: "build_metrics".to_string(),
            user: "ci".to_string(),
            password: None,
            psql_path: "psql".to_string(),
            query_timeout_secs: 10,
            analyze_window_days: 7,
            strict_track: false,
        }
    }
}

/// What to do when a branch has fewer than `min_samples` builds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColdStartPolicy {
    /// Widen the window to every branch
    #[default]
    AllBranches,
    /// Never widen; callers fall back to static defaults
    #[serde(rename = "none")]
    BranchOnly,
}

/// Resource recommendation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    /// Percentile of peak usage to size for
    pub percentile: f64,
    /// Fractional margin added on top of the percentile
    pub safety_margin: f64,
    /// Samples below which confidence is low
    pub min_samples: usize,
    /// Last N builds
    pub lookback_builds: usize,
    /// Last N days
    pub lookback_days: u32,
    /// Fraction above the largest OOM peak the memory must reach
    pub oom_headroom: f64,
    pub min_memory_mb: u64,
    pub max_memory_mb: u64,
    pub min_cpu_cores: u32,
    pub max_cpu_cores: u32,
    /// Memory recommendations are rounded up to a multiple of this
    pub memory_step_mb: u64,
    /// Share of the memory budget given to the JVM heap
    pub jvm_heap_ratio: f64,
    pub cold_start: ColdStartPolicy,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            percentile: 95.0,
            safety_margin: 0.20,
            min_samples: 5,
            lookback_builds: 20,
            lookback_days: 30,
            oom_headroom: 0.25,
            min_memory_mb: 512,
            max_memory_mb: 16384,
            min_cpu_cores: 1,
            max_cpu_cores: 16,
            memory_step_mb: 64,
            jvm_heap_ratio: 0.75,
            cold_start: ColdStartPolicy::AllBranches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[cache]"));
        assert!(toml.contains("[resources]"));
        assert!(toml.contains("cold_start = \"all-branches\""));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.cache.preset, ManifestPreset::Gradle);
        assert_eq!(config.metrics.backend, MetricsBackend::Jsonl);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [resources]
            percentile = 90.0
            cold_start = "none"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.resources.percentile, 90.0);
        assert_eq!(config.resources.cold_start, ColdStartPolicy::BranchOnly);
        assert_eq!(config.resources.min_samples, 5); // default preserved
    }

    #[test]
    fn manifest_list_prefers_explicit_list() {
        let mut cache = CacheConfig::default();
        assert_eq!(cache.manifest_list()[0], "build.gradle");

        cache.manifests = vec!["lock.txt".to_string(), "build.txt".to_string()];
        assert_eq!(cache.manifest_list(), vec!["lock.txt", "build.txt"]);
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("SMARTCACHE_CACHE_DIR", "/ci/cache"),
            ("SMARTCACHE_DB_HOST", "db.internal"),
            ("SMARTCACHE_DB_PORT", "6432"),
            ("SMARTCACHE_DB_PASSWORD", "s3cret"),
            ("SMARTCACHE_METRICS_BACKEND", "postgres"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.cache.cache_dir, Some(PathBuf::from("/ci/cache")));
        assert_eq!(config.metrics.host, "db.internal");
        assert_eq!(config.metrics.port, 6432);
        assert_eq!(config.metrics.password.as_deref(), Some("s3cret"));
        assert_eq!(config.metrics.backend, MetricsBackend::Postgres);
    }

    #[test]
    fn bad_env_port_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_env(|k| (k == "SMARTCACHE_DB_PORT").then(|| "abc".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.resources.min_memory_mb = 32768;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_finite_margins() {
        let config: Config = toml::from_str("[resources]\nsafety_margin = nan\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[resources]\noom_headroom = inf\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[resources]\nsafety_margin = -0.1\n").unwrap();
        assert!(config.validate().is_err());
    }
}
