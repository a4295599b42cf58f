//! Warm command - populate the cache for the current fingerprint

use super::{cache_store, current_fingerprint, project_dir};
use crate::cache::{format_bytes, CommandPopulator, Populator, WarmOutcome};
use crate::cli::args::WarmArgs;
use crate::config::Config;
use crate::error::SmartCacheResult;
use crate::ui::{self, UiContext, WarmProgress};
use std::time::Duration;
use tracing::debug;

/// Execute the warm command
pub async fn execute(args: WarmArgs, config: &Config) -> SmartCacheResult<()> {
    let ctx = UiContext::detect();
    let project_dir = project_dir(config)?;
    let fingerprint = current_fingerprint(config, &project_dir)?;
    let store = cache_store(config);

    let timeout = Duration::from_secs(args.timeout.unwrap_or(config.cache.warm_timeout_secs));
    let populator =
        CommandPopulator::new(&config.cache.warm_command, &config.cache.warm_env_var, timeout)?;
    debug!(
        "Warming {} into {} with {}",
        fingerprint.short(),
        store.root().display(),
        populator.describe()
    );

    let progress = WarmProgress::new(&ctx, fingerprint.short());
    let on_output = |line: String| progress.on_line(&line);
    let result = store
        .warm(&fingerprint, &project_dir, &populator, &on_output)
        .await;
    progress.finish();

    match result? {
        WarmOutcome::AlreadyPresent(entry) => {
            ui::step_ok_detail(
                &ctx,
                "Cache already present",
                &format!(
                    "{}, populated {}",
                    fingerprint.short(),
                    entry.populated_at.format("%Y-%m-%d %H:%M UTC")
                ),
            );
        }
        WarmOutcome::Populated {
            entry,
            replaced_stale,
        } => {
            if replaced_stale {
                ui::step_info(&ctx, "Replaced stale cache entry");
            }
            ui::step_ok_detail(
                &ctx,
                &format!("Cache warmed for {}", fingerprint.short()),
                &format!(
                    "{} dependencies, {}",
                    entry.dependency_count,
                    format_bytes(entry.size_bytes)
                ),
            );
            if progress.downloads() > 0 {
                ui::remark(&ctx, &format!("{} downloads", progress.downloads()));
            }
        }
    }

    Ok(())
}
