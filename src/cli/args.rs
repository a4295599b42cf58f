//! CLI argument definitions using clap derive

use crate::metrics::{BuildResult, CacheOutcome};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// smartcache - fingerprinted dependency caching and build sizing for CI
///
/// Keeps one dependency cache keyed by a digest of the build manifests,
/// tracks how often builds hit it, and sizes memory/CPU for the next build
/// from historical telemetry.
#[derive(Parser, Debug)]
#[command(name = "smartcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SMARTCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .smartcache.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Project directory holding the build manifests (default: current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Cache root directory
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Populate the cache for the current fingerprint
    Warm(WarmArgs),

    /// Show cache state for the current fingerprint
    Status(StatusArgs),

    /// Evict the cache entry (stale entries only, unless --force)
    Invalidate(InvalidateArgs),

    /// Record a cache hit or miss for this build
    Track(TrackArgs),

    /// Report cache effectiveness over a recent window
    Analyze(AnalyzeArgs),

    /// Recommend memory/CPU for a branch from build history
    Resources(ResourcesArgs),

    /// Record telemetry for a finished build
    RecordBuild(RecordBuildArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Print shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the warm command
#[derive(Parser, Debug)]
pub struct WarmArgs {
    /// Override cache.warm_timeout_secs
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the invalidate command
#[derive(Parser, Debug)]
pub struct InvalidateArgs {
    /// Evict even when the entry matches the current fingerprint
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the track command
#[derive(Parser, Debug)]
pub struct TrackArgs {
    /// Whether this build hit the cache
    pub outcome: OutcomeArg,

    /// Build identifier (joins events to build samples)
    #[arg(long, env = "BUILD_ID")]
    pub build_id: Option<String>,
}

/// Arguments for the analyze command
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Window in days (default: metrics.analyze_window_days)
    #[arg(long)]
    pub days: Option<u32>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the resources command
#[derive(Parser, Debug)]
pub struct ResourcesArgs {
    /// Branch to size the next build for
    #[arg(long)]
    pub branch: String,

    /// Write the recommendation to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: RecommendationFormat,
}

/// Arguments for the record-build command
#[derive(Parser, Debug)]
pub struct RecordBuildArgs {
    /// Build identifier
    #[arg(long, env = "BUILD_ID")]
    pub build_id: String,

    /// Branch the build ran on
    #[arg(long)]
    pub branch: String,

    /// Wall-clock duration in seconds
    #[arg(long)]
    pub duration: f64,

    /// Peak resident memory in MB
    #[arg(long)]
    pub peak_memory: f64,

    /// Average CPU cores used
    #[arg(long)]
    pub cpu: f64,

    /// Build result
    #[arg(long)]
    pub result: ResultArg,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the merged configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}

/// Output format for resource recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecommendationFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// KEY=value lines for CI env files
    Env,
}

/// Cache outcome as a CLI value
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutcomeArg {
    Hit,
    Miss,
}

impl From<OutcomeArg> for CacheOutcome {
    fn from(arg: OutcomeArg) -> Self {
        match arg {
            OutcomeArg::Hit => Self::Hit,
            OutcomeArg::Miss => Self::Miss,
        }
    }
}

/// Build result as a CLI value
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResultArg {
    Success,
    Failure,
    Oom,
}

impl From<ResultArg> for BuildResult {
    fn from(arg: ResultArg) -> Self {
        match arg {
            ResultArg::Success => Self::Success,
            ResultArg::Failure => Self::Failure,
            ResultArg::Oom => Self::Oom,
        }
    }
}
