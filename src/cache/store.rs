//! On-disk cache store
//!
//! Layout under the cache root:
//!
//! | Path | Purpose |
//! |------|---------|
//! | `entry/` | committed dependency directory |
//! | `entry/.smartcache-entry.json` | fingerprint metadata, written last |
//! | `.lock` | advisory lock for warm/invalidate |
//! | `.staging-<uuid>/` | population in progress |
//! | `.evicted-<uuid>/` | evicted entry awaiting deletion |
//!
//! Every mutation of `entry/` is a single `rename`, done while holding the
//! lock, so an interrupted process leaves either the previous entry or
//! nothing, never a half-populated directory marked as fresh.

use crate::cache::entry::{measure_dir, CacheEntry, CacheState, CacheStatus, ENTRY_METADATA_FILE};
use crate::cache::fingerprint::Fingerprint;
use crate::cache::lock::CacheLock;
use crate::cache::populate::Populator;
use crate::error::{SmartCacheError, SmartCacheResult};
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

const ENTRY_DIR: &str = "entry";
const LOCK_FILE: &str = ".lock";
const STAGING_PREFIX: &str = ".staging-";
const EVICTED_PREFIX: &str = ".evicted-";

/// Outcome of `warm`
#[derive(Debug, Clone)]
pub enum WarmOutcome {
    /// Entry already matched the fingerprint; nothing was touched
    AlreadyPresent(CacheEntry),
    /// A new entry was populated and committed
    Populated {
        entry: CacheEntry,
        /// Whether a stale entry was replaced
        replaced_stale: bool,
    },
}

/// Outcome of `invalidate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidateOutcome {
    /// No entry existed
    NothingToRemove,
    /// Entry is fresh and `force` was not given
    AlreadyFresh,
    /// Entry was evicted; carries the state it had
    Evicted(CacheState),
}

/// Fingerprint-keyed dependency cache rooted at a directory
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    lock_timeout: Duration,
    artifact_extensions: Vec<String>,
}

impl CacheStore {
    /// Create a store rooted at `root`
    pub fn new(root: PathBuf, lock_timeout: Duration, artifact_extensions: Vec<String>) -> Self {
        Self {
            root,
            lock_timeout,
            artifact_extensions,
        }
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Committed entry directory (what builds should point at)
    pub fn entry_dir(&self) -> PathBuf {
        self.root.join(ENTRY_DIR)
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Report the state of the committed entry. Takes no lock.
    pub async fn status(&self, fingerprint: &Fingerprint) -> SmartCacheResult<CacheStatus> {
        let entry_dir = self.entry_dir();
        let dir_exists = match fs::metadata(&entry_dir).await {
            Ok(meta) => meta.is_dir(),
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                return Err(SmartCacheError::io(
                    format!("inspecting {}", entry_dir.display()),
                    e,
                ))
            }
        };

        let entry = if dir_exists {
            self.read_entry(&entry_dir).await?
        } else {
            None
        };

        Ok(CacheStatus::classify(fingerprint.clone(), dir_exists, entry))
    }

    /// Read entry metadata; unreadable or malformed metadata counts as missing
    async fn read_entry(&self, dir: &Path) -> SmartCacheResult<Option<CacheEntry>> {
        let path = dir.join(ENTRY_METADATA_FILE);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SmartCacheError::io(
                    format!("reading cache metadata {}", path.display()),
                    e,
                ))
            }
        };

        match serde_json::from_str(&content) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!("Ignoring malformed cache metadata {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Populate the cache for `fingerprint` unless it is already present
    ///
    /// Population happens in a staging directory that only replaces the
    /// committed entry after the populator succeeds and the metadata is on
    /// disk. A failed populate leaves any existing entry untouched.
    pub async fn warm(
        &self,
        fingerprint: &Fingerprint,
        project_dir: &Path,
        populator: &dyn Populator,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> SmartCacheResult<WarmOutcome> {
        let _lock = CacheLock::acquire(&self.lock_path(), self.lock_timeout).await?;
        self.sweep_leftovers().await;

        let before = self.status(fingerprint).await?;
        if let (CacheState::Present, Some(entry)) = (before.state, before.entry.clone()) {
            debug!("Cache already present for {}", fingerprint.short());
            return Ok(WarmOutcome::AlreadyPresent(entry));
        }

        let staging = self.root.join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4()));
        fs::create_dir_all(&staging).await.map_err(|e| {
            SmartCacheError::io(format!("creating staging dir {}", staging.display()), e)
        })?;

        if let Err(e) = populator.populate(project_dir, &staging, on_output).await {
            remove_dir_best_effort(&staging).await;
            return Err(e);
        }

        let measure = measure_dir(&staging, &self.artifact_extensions);
        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            populated_at: Utc::now(),
            size_bytes: measure.size_bytes,
            dependency_count: measure.dependency_count,
        };

        if let Err(e) = write_metadata(&staging, &entry).await {
            remove_dir_best_effort(&staging).await;
            return Err(e);
        }
        self.commit(&staging).await?;

        info!(
            "Cache populated for {} ({} dependencies)",
            fingerprint.short(),
            entry.dependency_count
        );
        Ok(WarmOutcome::Populated {
            entry,
            replaced_stale: before.state == CacheState::Stale,
        })
    }

    /// Evict the committed entry according to its state and `force`
    ///
    /// ABSENT is always a no-op, STALE is always evicted, PRESENT is only
    /// evicted when forced.
    pub async fn invalidate(
        &self,
        fingerprint: &Fingerprint,
        force: bool,
    ) -> SmartCacheResult<InvalidateOutcome> {
        let _lock = CacheLock::acquire(&self.lock_path(), self.lock_timeout).await?;
        self.sweep_leftovers().await;

        let status = self.status(fingerprint).await?;
        match (status.state, force) {
            (CacheState::Absent, _) => Ok(InvalidateOutcome::NothingToRemove),
            (CacheState::Present, false) => {
                debug!("Refusing to evict fresh cache {}", fingerprint.short());
                Ok(InvalidateOutcome::AlreadyFresh)
            }
            (state, _) => {
                self.evict().await?;
                info!("Evicted {} cache entry", state);
                Ok(InvalidateOutcome::Evicted(state))
            }
        }
    }

    /// Swap a fully written staging dir into place
    async fn commit(&self, staging: &Path) -> SmartCacheResult<()> {
        let entry_dir = self.entry_dir();
        let evicted = self.root.join(format!("{}{}", EVICTED_PREFIX, Uuid::new_v4()));

        let had_previous = match fs::rename(&entry_dir, &evicted).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                remove_dir_best_effort(staging).await;
                return Err(SmartCacheError::io(
                    format!("moving aside {}", entry_dir.display()),
                    e,
                ));
            }
        };

        if let Err(e) = fs::rename(staging, &entry_dir).await {
            if had_previous {
                restore_previous(&evicted, &entry_dir).await;
            }
            remove_dir_best_effort(staging).await;
            return Err(SmartCacheError::io(
                format!("committing {}", entry_dir.display()),
                e,
            ));
        }

        if had_previous {
            remove_dir_best_effort(&evicted).await;
        }
        Ok(())
    }

    /// Atomically detach the committed entry, then delete it
    async fn evict(&self) -> SmartCacheResult<()> {
        let entry_dir = self.entry_dir();
        let evicted = self.root.join(format!("{}{}", EVICTED_PREFIX, Uuid::new_v4()));

        fs::rename(&entry_dir, &evicted)
            .await
            .map_err(|e| SmartCacheError::io(format!("evicting {}", entry_dir.display()), e))?;
        remove_dir_best_effort(&evicted).await;
        Ok(())
    }

    /// Remove staging/evicted dirs left behind by interrupted runs. Lock must be held.
    async fn sweep_leftovers(&self) {
        let Ok(mut entries) = fs::read_dir(&self.root).await else {
            return;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(STAGING_PREFIX) || name.starts_with(EVICTED_PREFIX) {
                debug!("Sweeping leftover {}", name);
                remove_dir_best_effort(&entry.path()).await;
            }
        }
    }
}

/// Write entry metadata via temp file + rename
async fn write_metadata(dir: &Path, entry: &CacheEntry) -> SmartCacheResult<()> {
    let path = dir.join(ENTRY_METADATA_FILE);
    let tmp_path = dir.join(format!("{}.tmp", ENTRY_METADATA_FILE));
    let content = serde_json::to_string_pretty(entry)?;

    fs::write(&tmp_path, content)
        .await
        .map_err(|e| SmartCacheError::io(format!("writing {}", tmp_path.display()), e))?;
    fs::rename(&tmp_path, &path)
        .await
        .map_err(|e| SmartCacheError::io(format!("renaming {}", tmp_path.display()), e))
}

/// Move a set-aside entry back after a failed commit. Returns whether it was restored.
async fn restore_previous(evicted: &Path, entry_dir: &Path) -> bool {
    match fs::rename(evicted, entry_dir).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                "Failed to restore previous entry from {}: {}",
                evicted.display(),
                e
            );
            false
        }
    }
}

async fn remove_dir_best_effort(path: &Path) {
    if let Err(e) = fs::remove_dir_all(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
