//! CLI command implementations

pub mod analyze;
pub mod completions;
pub mod config;
pub mod invalidate;
pub mod record_build;
pub mod resources;
pub mod status;
pub mod track;
pub mod warm;

pub use analyze::execute as analyze;
pub use completions::execute as completions;
pub use config::execute as config;
pub use invalidate::execute as invalidate;
pub use record_build::execute as record_build;
pub use resources::execute as resources;
pub use status::execute as status;
pub use track::execute as track;
pub use warm::execute as warm;

use crate::cache::{compute_fingerprint, resolve_manifests, CacheStore, Fingerprint};
use crate::config::{Config, ConfigManager};
use crate::error::{SmartCacheError, SmartCacheResult};
use std::path::PathBuf;
use std::time::Duration;

/// Project directory from config, falling back to the current directory
pub(crate) fn project_dir(config: &Config) -> SmartCacheResult<PathBuf> {
    match config.general.project_dir {
        Some(ref dir) => Ok(dir.clone()),
        None => std::env::current_dir()
            .map_err(|e| SmartCacheError::io("getting current directory", e)),
    }
}

/// Cache store for the configured cache root
pub(crate) fn cache_store(config: &Config) -> CacheStore {
    let root = config
        .cache
        .cache_dir
        .clone()
        .unwrap_or_else(ConfigManager::default_cache_dir);
    CacheStore::new(
        root,
        Duration::from_secs(config.cache.lock_timeout_secs),
        config.cache.artifact_extensions.clone(),
    )
}

/// Fingerprint of the project's manifests as they are on disk now
pub(crate) fn current_fingerprint(
    config: &Config,
    project_dir: &std::path::Path,
) -> SmartCacheResult<Fingerprint> {
    let manifests = resolve_manifests(project_dir, &config.cache.manifest_list());
    compute_fingerprint(&manifests)
}
