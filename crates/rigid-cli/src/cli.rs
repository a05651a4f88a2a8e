use clap::{Args, Parser, Subcommand};
use rigid_flows::engine::oracle::ErrorHandling;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Jonas Köhler",
    version,
    about = "rigid - Evaluate and sample the base and target densities of rigid water systems.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate the target potential of the model's default configuration.
    Evaluate(EvaluateArgs),
    /// Draw samples from the base density and summarize their potentials.
    SampleBase(SampleBaseArgs),
}

/// Arguments for the `evaluate` subcommand.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Path to the run file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override the system temperature (K) from the run file.
    #[arg(short, long, value_name = "FLOAT")]
    pub temperature: Option<f64>,

    /// Override the per-sample error policy (raise, log-warning, silent).
    #[arg(short, long, value_name = "POLICY")]
    pub error_handling: Option<ErrorHandling>,
}

/// Arguments for the `sample-base` subcommand.
#[derive(Args, Debug)]
pub struct SampleBaseArgs {
    /// Path to the run file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Number of samples to draw.
    #[arg(short, long, default_value_t = 100, value_name = "INT")]
    pub num_samples: usize,

    /// Seed for the random number generator. Drawn from the OS when omitted.
    #[arg(short, long, value_name = "INT")]
    pub seed: Option<u64>,
}
