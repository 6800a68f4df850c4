//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Costguard - estimate warehouse cost of compiled models before they run
#[derive(Parser, Debug)]
#[command(name = "costguard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override policy file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// DuckDB database acting as the warehouse
    #[arg(short, long, global = true, default_value = ":memory:")]
    pub warehouse: String,

    /// Override dollars per warehouse credit
    #[arg(long, global = true)]
    pub cost_per_credit: Option<f64>,

    /// Override both the per-job and total-run thresholds, in dollars
    #[arg(short, long, global = true)]
    pub threshold: Option<f64>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Estimate the cost of every selected model
    Estimate(EstimateArgs),

    /// Show a detailed cost breakdown for one model
    Analyze(AnalyzeArgs),

    /// Estimate, then run a command if the policy allows it
    Run(RunArgs),

    /// Write a default costguard.yml
    Init(InitArgs),

    /// Show the effective cost policy, command-line overrides applied
    Config,
}

/// Where jobs come from and which of them to estimate
#[derive(Args, Debug, Clone)]
pub struct JobSelection {
    /// Path to manifest.json (default: <project-dir>/target/manifest.json)
    #[arg(short, long)]
    pub manifest: Option<String>,

    /// Glob patterns of models to include (comma-separated, default: all)
    #[arg(short, long)]
    pub select: Option<String>,

    /// Glob patterns of models to leave out (comma-separated)
    #[arg(short = 'x', long)]
    pub exclude: Option<String>,
}

/// Arguments for the estimate command
#[derive(Args, Debug)]
pub struct EstimateArgs {
    #[command(flatten)]
    pub selection: JobSelection,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Estimate output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON verdict
    Json,
}

/// Arguments for the analyze command
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Model name; an exact match wins, otherwise the first name containing it
    #[arg(long)]
    pub model: String,

    /// Path to manifest.json (default: <project-dir>/target/manifest.json)
    #[arg(long)]
    pub manifest: Option<String>,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: JobSelection,

    /// Run without asking when thresholds are exceeded (blocked runs still refuse)
    #[arg(short, long)]
    pub yes: bool,

    /// Command to run once the estimate passes
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing costguard.yml
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
