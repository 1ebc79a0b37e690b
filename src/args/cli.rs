use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::regression::DEFAULT_THRESHOLD;
use crate::scenario::ErrorPolicy;

use super::parsers::{parse_error_policy, parse_threshold};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Async HTTP load-testing and performance-regression engine - scenario runs against a managed service, JSON snapshots, and baseline diffing for CI gates."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging (overridden by STRESSGATE_LOG / RUST_LOG)
    #[arg(long = "verbose", short = 'v', global = true, env = "STRESSGATE_VERBOSE")]
    pub verbose: bool,

    /// Disable ANSI colors in log output
    #[arg(long = "no-color", global = true, env = "NO_COLOR")]
    pub no_color: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the configured scenarios and write snapshots
    Run(RunArgs),
    /// Compare a current snapshot against a baseline
    Compare(CompareArgs),
    /// Validate a config file without sending any request
    Check(CheckArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Config file (.toml or .json); defaults to stressgate.toml, then stressgate.json
    #[arg(long = "config", short = 'c', env = "STRESSGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run only the named scenario (repeatable)
    #[arg(long = "scenario", short = 's')]
    pub scenarios: Vec<String>,

    /// Directory for snapshot documents and trend.csv (overrides [run].output_dir)
    #[arg(long = "output-dir", short = 'o', env = "STRESSGATE_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// What to do when a scenario fails: continue or abort (overrides [run].on_error)
    #[arg(long = "on-error", value_parser = parse_error_policy)]
    pub on_error: Option<ErrorPolicy>,

    /// Assume the service is already running; only health-check it
    #[arg(long = "no-service")]
    pub no_service: bool,
}

#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    /// Baseline snapshot (JSON)
    #[arg(long = "baseline", short = 'b')]
    pub baseline: PathBuf,

    /// Current snapshot (JSON)
    #[arg(long = "current")]
    pub current: PathBuf,

    /// Allowed relative difference as a fraction (0.1 = 10%)
    #[arg(long = "threshold", short = 't', default_value_t = DEFAULT_THRESHOLD, value_parser = parse_threshold)]
    pub threshold: f64,
}

#[derive(Debug, Args, Clone)]
pub struct CheckArgs {
    /// Config file (.toml or .json); defaults to stressgate.toml, then stressgate.json
    #[arg(long = "config", short = 'c', env = "STRESSGATE_CONFIG")]
    pub config: Option<PathBuf>,
}
