//! Invalidate command - evict the cache entry

use super::{cache_store, current_fingerprint, project_dir};
use crate::cache::{CacheState, InvalidateOutcome};
use crate::cli::args::InvalidateArgs;
use crate::config::Config;
use crate::error::SmartCacheResult;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the invalidate command
pub async fn execute(args: InvalidateArgs, config: &Config) -> SmartCacheResult<()> {
    let ctx = UiContext::detect();
    let project_dir = project_dir(config)?;
    let fingerprint = current_fingerprint(config, &project_dir)?;
    let store = cache_store(config);

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Acquiring cache lock...");

    let outcome = match store.invalidate(&fingerprint, args.force).await {
        Ok(outcome) => outcome,
        Err(e) => {
            spinner.stop_error("Invalidate failed");
            return Err(e);
        }
    };

    match outcome {
        InvalidateOutcome::NothingToRemove => spinner.stop("No cache entry, nothing to remove"),
        InvalidateOutcome::AlreadyFresh => {
            spinner.stop_warn("Cache is already fresh, left untouched");
            ui::remark(&ctx, "Use --force to evict a fresh entry");
        }
        InvalidateOutcome::Evicted(CacheState::Present) => {
            spinner.stop(&format!("Evicted fresh entry {} (forced)", fingerprint.short()))
        }
        InvalidateOutcome::Evicted(state) => spinner.stop(&format!("Evicted {} entry", state)),
    }

    Ok(())
}
