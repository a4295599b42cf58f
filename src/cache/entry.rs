//! Cache entry metadata and state
//!
//! A cache entry is the committed dependency directory plus a small JSON
//! record of the fingerprint it was populated for. Validity is purely a
//! matter of comparing that record with a freshly computed fingerprint.

use crate::cache::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use walkdir::WalkDir;

/// Metadata file name, written inside the entry directory as the last step of `warm`
pub const ENTRY_METADATA_FILE: &str = ".smartcache-entry.json";

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// State of the cache relative to the current fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheState {
    /// No entry directory exists
    Absent,
    /// Entry exists and its recorded fingerprint matches
    Present,
    /// Entry exists but its fingerprint differs or its metadata is missing
    Stale,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "ABSENT"),
            Self::Present => write!(f, "PRESENT"),
            Self::Stale => write!(f, "STALE"),
        }
    }
}

/// Recorded metadata for a populated cache directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Fingerprint the directory was populated for
    pub fingerprint: Fingerprint,
    /// When population finished
    pub populated_at: DateTime<Utc>,
    /// Total size of the directory in bytes
    pub size_bytes: u64,
    /// Number of dependency artifacts found
    pub dependency_count: u64,
}

/// Why an existing directory is not served as fresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
    /// Recorded fingerprint differs from the current one
    FingerprintChanged { recorded: Fingerprint },
    /// Directory has no readable metadata (interrupted warm or foreign content)
    MissingMetadata,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FingerprintChanged { recorded } => {
                write!(f, "populated for {}", recorded.short())
            }
            Self::MissingMetadata => write!(f, "no recorded fingerprint"),
        }
    }
}

/// Result of a read-only status check
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    /// Derived state
    pub state: CacheState,
    /// Current fingerprint
    pub fingerprint: Fingerprint,
    /// Metadata of the committed entry (when readable)
    pub entry: Option<CacheEntry>,
    /// Set when state is STALE
    pub stale_reason: Option<StaleReason>,
}

impl CacheStatus {
    /// Derive the state from the committed directory and its metadata
    pub fn classify(
        fingerprint: Fingerprint,
        dir_exists: bool,
        entry: Option<CacheEntry>,
    ) -> Self {
        if !dir_exists {
            return Self {
                state: CacheState::Absent,
                fingerprint,
                entry: None,
                stale_reason: None,
            };
        }

        match entry {
            Some(entry) if entry.fingerprint == fingerprint => Self {
                state: CacheState::Present,
                fingerprint,
                entry: Some(entry),
                stale_reason: None,
            },
            Some(entry) => Self {
                state: CacheState::Stale,
                fingerprint,
                stale_reason: Some(StaleReason::FingerprintChanged {
                    recorded: entry.fingerprint.clone(),
                }),
                entry: Some(entry),
            },
            None => Self {
                state: CacheState::Stale,
                fingerprint,
                entry: None,
                stale_reason: Some(StaleReason::MissingMetadata),
            },
        }
    }
}

/// Size and artifact count of a populated directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirMeasure {
    pub size_bytes: u64,
    pub dependency_count: u64,
}

/// Walk a directory, summing file sizes and counting artifacts
///
/// An empty `artifact_extensions` list counts every regular file.
pub fn measure_dir(dir: &Path, artifact_extensions: &[String]) -> DirMeasure {
    let mut measure = DirMeasure::default();

    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() || entry.file_name() == ENTRY_METADATA_FILE {
            continue;
        }
        if let Ok(meta) = entry.metadata() {
            measure.size_bytes += meta.len();
        }

        let is_artifact = artifact_extensions.is_empty()
            || entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| artifact_extensions.iter().any(|a| a == ext));
        if is_artifact {
            measure.dependency_count += 1;
        }
    }

    measure
}
