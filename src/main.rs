//! smartcache - CI dependency cache and build sizing
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use smartcache::cli::{Cli, Commands};
use smartcache::config::{Config, ConfigManager};
use smartcache::error::{SmartCacheError, SmartCacheResult};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_no_data() => {
            eprintln!("{} {}", style("No data:").yellow().bold(), no_data_detail(&e));
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn no_data_detail(e: &SmartCacheError) -> String {
    match e {
        SmartCacheError::NoData { what } => what.clone(),
        other => other.to_string(),
    }
}

async fn run() -> SmartCacheResult<()> {
    let cli = Cli::parse();

    // Completions need neither logging nor config
    if let Commands::Completions(args) = cli.command {
        return smartcache::cli::commands::completions(args);
    }

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // Local config is discovered from the project dir, not the cwd
    let discovery_root = match cli.project_dir {
        Some(ref dir) => dir.clone(),
        None => match std::env::var_os("SMARTCACHE_PROJECT_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()
                .map_err(|e| SmartCacheError::io("getting current directory", e))?,
        },
    };
    let local_config_path = if cli.no_local {
        None
    } else {
        ConfigManager::find_local_config(&discovery_root)
    };

    let mut config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;
    config.apply_env(|key| std::env::var(key).ok())?;
    apply_cli_overrides(&mut config, &cli);

    init_logging(cli.verbose, &config);
    if let Some(ref path) = local_config_path {
        debug!("Merged local config: {}", path.display());
    }

    config.validate()?;
    smartcache::ui::init_theme();

    // Dispatch to command
    match cli.command {
        Commands::Completions(_) => unreachable!("Completions handled above"),
        Commands::Warm(args) => smartcache::cli::commands::warm(args, &config).await,
        Commands::Status(args) => smartcache::cli::commands::status(args, &config).await,
        Commands::Invalidate(args) => smartcache::cli::commands::invalidate(args, &config).await,
        Commands::Track(args) => smartcache::cli::commands::track(args, &config).await,
        Commands::Analyze(args) => smartcache::cli::commands::analyze(args, &config).await,
        Commands::Resources(args) => smartcache::cli::commands::resources(args, &config).await,
        Commands::RecordBuild(args) => smartcache::cli::commands::record_build(args, &config).await,
        Commands::Config(args) => {
            smartcache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// Flags win over env, env wins over files
fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(ref dir) = cli.project_dir {
        config.general.project_dir = Some(dir.clone());
    }
    if let Some(ref dir) = cli.cache_dir {
        config.cache.cache_dir = Some(dir.clone());
    }
}

/// Initialize logging: 0 = warn, 1 = info, 2+ = debug. Always to stderr.
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("smartcache=warn"),
        1 => EnvFilter::new("smartcache=info"),
        _ => EnvFilter::new("smartcache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
