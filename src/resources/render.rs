//! Machine-readable renderings of a recommendation

use crate::error::{SmartCacheError, SmartCacheResult};
use crate::resources::recommend::ResourceRecommendation;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

/// Pretty JSON with a trailing newline
pub fn to_json(rec: &ResourceRecommendation) -> SmartCacheResult<String> {
    let mut out = serde_json::to_string_pretty(rec)?;
    out.push('\n');
    Ok(out)
}

/// `KEY=value` lines suitable for `source` or a CI env file
pub fn to_env(rec: &ResourceRecommendation) -> String {
    format!(
        "BUILD_MEMORY_MB={}\n\
         BUILD_CPU_CORES={}\n\
         GRADLE_OPTS=\"-Xmx{}m\"\n\
         GRADLE_MAX_WORKERS={}\n\
         RECOMMENDATION_CONFIDENCE={}\n\
         RECOMMENDATION_SAMPLES={}\n",
        rec.memory_mb,
        rec.cpu_cores,
        rec.jvm_heap_mb,
        rec.cpu_cores,
        rec.confidence,
        rec.basis_sample_count,
    )
}

/// Write `content` to `path` via a sibling temp file and rename
///
/// Readers see either the old file or the complete new one.
pub async fn write_atomic(path: &Path, content: &str) -> SmartCacheResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .await
        .map_err(|e| SmartCacheError::io(format!("creating {}", parent.display()), e))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| {
            SmartCacheError::InvalidArgument(format!("not a file path: {}", path.display()))
        })?
        .to_string_lossy();
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    fs::write(&tmp, content)
        .await
        .map_err(|e| SmartCacheError::io(format!("writing {}", tmp.display()), e))?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(SmartCacheError::io(format!("renaming into {}", path.display()), e));
    }
    Ok(())
}
