//! Costguard CLI - pre-execution cost guard for warehouse transformation jobs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::Cli;
use commands::common::ExitCode;
use commands::{analyze, config, estimate, init, run};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    if let Err(err) = dispatch(&cli).await {
        if let Some(ExitCode(code)) = err.downcast_ref::<ExitCode>() {
            std::process::exit(*code);
        }
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

async fn dispatch(cli: &Cli) -> Result<()> {
    match &cli.command {
        cli::Commands::Estimate(args) => estimate::execute(args, &cli.global).await,
        cli::Commands::Analyze(args) => analyze::execute(args, &cli.global).await,
        cli::Commands::Run(args) => run::execute(args, &cli.global).await,
        cli::Commands::Init(args) => init::execute(args, &cli.global).await,
        cli::Commands::Config => config::execute(&cli.global).await,
    }
}

/// `RUST_LOG` wins; otherwise warnings, or debug output with `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}
