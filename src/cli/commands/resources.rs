//! Resources command - recommend memory/CPU for a branch

use crate::cli::args::{RecommendationFormat, ResourcesArgs};
use crate::config::Config;
use crate::error::SmartCacheResult;
use crate::metrics::open_store;
use crate::resources::{self, render, Confidence, ResourceRecommendation};
use crate::ui::{self, UiContext};
use chrono::Utc;

/// Execute the resources command
pub async fn execute(args: ResourcesArgs, config: &Config) -> SmartCacheResult<()> {
    resources::validate_branch(&args.branch)?;

    let store = open_store(&config.metrics);
    let rec =
        resources::recommend(store.as_ref(), &args.branch, &config.resources, Utc::now()).await?;

    match args.output {
        Some(ref path) => {
            // A table is for terminals; files get JSON
            let content = match args.format {
                RecommendationFormat::Env => render::to_env(&rec),
                RecommendationFormat::Table | RecommendationFormat::Json => render::to_json(&rec)?,
            };
            render::write_atomic(path, &content).await?;
            let ctx = UiContext::detect();
            ui::step_ok_detail(
                &ctx,
                &format!("Recommendation for {} written", rec.branch),
                &path.display().to_string(),
            );
        }
        None => match args.format {
            RecommendationFormat::Env => print!("{}", render::to_env(&rec)),
            RecommendationFormat::Json => print!("{}", render::to_json(&rec)?),
            RecommendationFormat::Table => print_table(&rec),
        },
    }

    Ok(())
}

fn print_table(rec: &ResourceRecommendation) {
    let ctx = UiContext::detect();
    ui::intro(&ctx, &format!("Resources for {}", rec.branch));

    ui::key_value(&ctx, "Memory", &format!("{} MB", rec.memory_mb));
    ui::key_value(&ctx, "JVM heap", &format!("{} MB", rec.jvm_heap_mb));
    ui::key_value(&ctx, "CPU cores", &rec.cpu_cores.to_string());
    ui::key_value_status(
        &ctx,
        "Confidence",
        &rec.confidence.to_string(),
        rec.confidence != Confidence::Low,
    );
    ui::key_value(
        &ctx,
        "Basis",
        &format!(
            "{} samples ({}), p{}",
            rec.basis_sample_count, rec.basis, rec.percentile
        ),
    );

    if rec.oom_adjusted {
        ui::step_warn(&ctx, "Raised memory above a recent OOM");
    }
    if rec.clamped {
        ui::remark(&ctx, "Clamped to platform bounds");
    }
    if rec.confidence == Confidence::Low {
        ui::remark(&ctx, "Few samples; consider the pipeline's static defaults");
    }
}
