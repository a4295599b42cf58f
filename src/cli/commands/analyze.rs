//! Analyze command - cache effectiveness report

use crate::cli::args::{AnalyzeArgs, OutputFormat};
use crate::config::Config;
use crate::effectiveness::{self, EffectivenessReport};
use crate::error::{SmartCacheError, SmartCacheResult};
use crate::metrics::open_store;
use crate::ui::{self, UiContext};
use chrono::Utc;

/// Execute the analyze command
///
/// Exits 1 with a no-data condition when the window holds no events.
pub async fn execute(args: AnalyzeArgs, config: &Config) -> SmartCacheResult<()> {
    let days = args.days.unwrap_or(config.metrics.analyze_window_days);
    if days == 0 {
        return Err(SmartCacheError::InvalidArgument(
            "--days must be at least 1".to_string(),
        ));
    }

    let store = open_store(&config.metrics);
    let report = effectiveness::analyze(store.as_ref(), days, Utc::now()).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => print_table(&report),
    }

    if report.sample_count == 0 {
        return Err(SmartCacheError::no_data(format!(
            "no cache events in the last {} days",
            days
        )));
    }
    Ok(())
}

fn print_table(report: &EffectivenessReport) {
    let ctx = UiContext::detect();
    ui::intro(&ctx, &format!("Cache effectiveness, last {} days", report.window_days));

    let hit_rate = match report.hit_rate {
        Some(rate) => format!("{:.1}%", rate * 100.0),
        None => "undefined (no events)".to_string(),
    };
    ui::key_value_status(
        &ctx,
        "Hit rate",
        &hit_rate,
        report.hit_rate.is_some_and(|r| r >= 0.5),
    );
    ui::key_value(
        &ctx,
        "Builds",
        &format!(
            "{} ({} hits, {} misses)",
            report.sample_count, report.hits, report.misses
        ),
    );
    ui::key_value(&ctx, "Avg duration (hit)", &format_secs(report.avg_duration_with_hit));
    ui::key_value(&ctx, "Avg duration (miss)", &format_secs(report.avg_duration_with_miss));

    if let Some(saved) = report.saved_per_hit() {
        ui::key_value(&ctx, "Saved per hit", &format!("{:.0}s", saved));
    }
    if report.sample_count > 0 && report.joined_builds < report.sample_count {
        ui::remark(
            &ctx,
            &format!(
                "{} of {} events had no build sample; record-build fills durations",
                report.sample_count - report.joined_builds,
                report.sample_count
            ),
        );
    }
}

fn format_secs(value: Option<f64>) -> String {
    match value {
        Some(secs) => format!("{:.0}s", secs),
        None => "-".to_string(),
    }
}
