//! Record-build command - append a build sample

use crate::cli::args::RecordBuildArgs;
use crate::config::Config;
use crate::error::{SmartCacheError, SmartCacheResult};
use crate::metrics::{open_store, BuildMetricSample, BuildResult};
use crate::resources::validate_branch;
use crate::ui::{self, UiContext};
use chrono::Utc;

/// Execute the record-build command
pub async fn execute(args: RecordBuildArgs, config: &Config) -> SmartCacheResult<()> {
    let sample = to_sample(args)?;

    let store = open_store(&config.metrics);
    store.record_build_sample(&sample).await?;

    let ctx = UiContext::detect();
    ui::step_ok_detail(
        &ctx,
        &format!("Recorded build {}", sample.build_id),
        &format!(
            "{}, {:.0} MB peak, {}",
            sample.branch, sample.peak_memory_mb, sample.result
        ),
    );
    Ok(())
}

fn to_sample(args: RecordBuildArgs) -> SmartCacheResult<BuildMetricSample> {
    validate_branch(&args.branch)?;
    if args.build_id.trim().is_empty() {
        return Err(SmartCacheError::InvalidArgument(
            "--build-id must not be empty".to_string(),
        ));
    }
    for (name, value) in [
        ("--duration", args.duration),
        ("--peak-memory", args.peak_memory),
        ("--cpu", args.cpu),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(SmartCacheError::InvalidArgument(format!(
                "{name} must be a non-negative number"
            )));
        }
    }

    Ok(BuildMetricSample {
        build_id: args.build_id,
        branch: args.branch,
        duration_seconds: args.duration,
        peak_memory_mb: args.peak_memory,
        cpu_cores_used: args.cpu,
        result: BuildResult::from(args.result),
        timestamp: Utc::now(),
    })
}
