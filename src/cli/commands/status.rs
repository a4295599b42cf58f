//! Status command - show cache state for the current fingerprint
//!
//! Informational only: always exits 0, even when the state cannot be
//! determined.

use super::{cache_store, current_fingerprint, project_dir};
use crate::cache::{format_bytes, CacheState, CacheStatus};
use crate::cli::args::{OutputFormat, StatusArgs};
use crate::config::Config;
use crate::error::SmartCacheResult;
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct StatusReport<'a> {
    cache_dir: PathBuf,
    entry_dir: PathBuf,
    manifests: Vec<String>,
    #[serde(flatten)]
    status: &'a CacheStatus,
}

/// Execute the status command
pub async fn execute(args: StatusArgs, config: &Config) -> SmartCacheResult<()> {
    match inspect(config).await {
        Ok(status) => print_status(&status, args.format, config),
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            Ok(())
        }
    }
}

async fn inspect(config: &Config) -> SmartCacheResult<CacheStatus> {
    let project_dir = project_dir(config)?;
    let fingerprint = current_fingerprint(config, &project_dir)?;
    cache_store(config).status(&fingerprint).await
}

fn print_status(
    status: &CacheStatus,
    format: OutputFormat,
    config: &Config,
) -> SmartCacheResult<()> {
    let store = cache_store(config);

    match format {
        OutputFormat::Json => {
            let report = StatusReport {
                cache_dir: store.root().to_path_buf(),
                entry_dir: store.entry_dir(),
                manifests: config.cache.manifest_list(),
                status,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => print_table(status, &store.entry_dir()),
    }
    Ok(())
}

fn print_table(status: &CacheStatus, entry_dir: &std::path::Path) {
    let ctx = UiContext::detect();

    println!("{} {}", style("Cache:").bold(), ui::styled_state(status.state));
    ui::key_value(&ctx, "Fingerprint", status.fingerprint.as_str());
    ui::key_value(&ctx, "Location", &entry_dir.display().to_string());

    if let Some(ref entry) = status.entry {
        ui::key_value(
            &ctx,
            "Populated",
            &entry.populated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
        ui::key_value(&ctx, "Size", &format_bytes(entry.size_bytes));
        ui::key_value(&ctx, "Dependencies", &entry.dependency_count.to_string());
    }

    match status.state {
        CacheState::Present => {}
        CacheState::Absent => ui::remark(&ctx, "Run: smartcache warm"),
        CacheState::Stale => {
            let reason = status
                .stale_reason
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_default();
            ui::step_warn_hint(
                &ctx,
                &format!("Entry is stale ({})", reason),
                "Run: smartcache invalidate && smartcache warm",
            );
        }
    }
}
