//! Error types for smartcache
//!
//! All modules use `SmartCacheResult<T>` as their return type.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for smartcache operations
pub type SmartCacheResult<T> = Result<T, SmartCacheError>;

/// All errors that can occur in smartcache
#[derive(Error, Debug)]
pub enum SmartCacheError {
    // Input errors
    #[error("Invalid branch name '{name}': {reason}")]
    InvalidBranch { name: String, reason: String },

    #[error("No dependency manifests declared")]
    EmptyManifestList,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Cache errors
    #[error("Timed out after {}s waiting for cache lock {path}", .waited.as_secs())]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("Cache population failed: {0}")]
    PopulateFailed(String),

    // Metrics errors
    #[error("Metrics store unavailable: {0}")]
    MetricsUnavailable(String),

    #[error("No data: {what}")]
    NoData { what: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout { operation: String, after: Duration },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl SmartCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a no-data condition
    pub fn no_data(what: impl Into<String>) -> Self {
        Self::NoData { what: what.into() }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::CommandFailed { .. }
                | Self::Timeout { .. }
                | Self::LockTimeout { .. }
                | Self::MetricsUnavailable(_)
                | Self::PopulateFailed(_)
        )
    }

    /// Whether this is the "not enough samples" condition rather than a failure
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidBranch { .. } => {
                Some("Branch names may contain letters, digits, '.', '_', '-' and '/'")
            }
            Self::EmptyManifestList => Some("Set cache.manifests or cache.preset in the config"),
            Self::LockTimeout { .. } => {
                Some("Another warm/invalidate holds the cache lock; retry when it finishes")
            }
            Self::MetricsUnavailable(_) => {
                Some("Check SMARTCACHE_DB_* variables or switch metrics.backend to jsonl")
            }
            Self::NoData { .. } => Some("Fall back to the pipeline's static defaults"),
            _ => None,
        }
    }
}
