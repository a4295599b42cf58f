//! Track command - record a cache hit or miss
//!
//! Telemetry must never fail a build: unless `metrics.strict_track` is set,
//! a store failure is reported as a warning and the command exits 0.

use super::{current_fingerprint, project_dir};
use crate::cli::args::TrackArgs;
use crate::config::Config;
use crate::effectiveness;
use crate::error::SmartCacheResult;
use crate::metrics::{open_store, CacheOutcome};
use crate::ui::{self, UiContext};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

/// Placeholder fingerprint when the manifests cannot be read
const UNKNOWN_FINGERPRINT: &str = "unknown";

/// Execute the track command
pub async fn execute(args: TrackArgs, config: &Config) -> SmartCacheResult<()> {
    let ctx = UiContext::detect();
    let outcome = CacheOutcome::from(args.outcome);

    let build_id = args.build_id.unwrap_or_else(|| {
        let id = format!("local-{}", Uuid::new_v4());
        warn!("No --build-id or BUILD_ID, recording as {}", id);
        id
    });

    let fingerprint = match project_dir(config).and_then(|dir| current_fingerprint(config, &dir)) {
        Ok(fp) => fp.to_string(),
        Err(e) => {
            warn!("Could not fingerprint manifests: {}", e);
            UNKNOWN_FINGERPRINT.to_string()
        }
    };

    let store = open_store(&config.metrics);
    match effectiveness::track(store.as_ref(), &build_id, &fingerprint, outcome, Utc::now()).await {
        Ok(_) => {
            ui::step_ok_detail(
                &ctx,
                &format!("Tracked cache {}", outcome),
                &format!("build {}, {}", build_id, store.backend_name()),
            );
            Ok(())
        }
        Err(e) if !config.metrics.strict_track => {
            warn!("Failed to record cache event: {}", e);
            ui::step_warn_hint(
                &ctx,
                &format!("Cache {} not recorded: {}", outcome, e),
                "Telemetry is best-effort; set metrics.strict_track to fail instead",
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}
