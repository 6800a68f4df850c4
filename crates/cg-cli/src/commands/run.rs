//! Run command implementation - estimate, then gate a downstream command

use anyhow::{Context, Result};
use cg_estimate::{RunVerdict, Signal};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::cli::{GlobalArgs, RunArgs};
use crate::commands::common::{self, ExitCode, EXIT_BLOCKED};
use crate::commands::render;

/// What to do with the command once the verdict is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    Proceed,
    Confirm,
    Refuse,
}

/// Allow proceeds; Warn (or an incomplete estimate) asks unless `--yes`;
/// Block always refuses.
pub(crate) fn gate(verdict: &RunVerdict, assume_yes: bool) -> Gate {
    match verdict.signal {
        Signal::Block => Gate::Refuse,
        Signal::Warn if !assume_yes => Gate::Confirm,
        Signal::Allow if verdict.incomplete && !assume_yes => Gate::Confirm,
        _ => Gate::Proceed,
    }
}

/// Only an explicit yes counts; empty input means no.
pub(crate) fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

async fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{} [y/N] ", prompt);
    std::io::stderr().flush().context("Failed to write prompt")?;

    let mut line = String::new();
    let read = BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read answer")?;
    // EOF (no terminal) declines
    Ok(read > 0 && is_yes(&line))
}

/// Execute the run command
pub(crate) async fn execute(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    let policy = common::load_policy(global)?;
    if !policy.enabled {
        eprintln!("Cost guard is disabled; running without an estimate.");
        return run_command(args, global).await;
    }

    let jobs = common::load_jobs(global, &args.selection)?;
    let engine = common::build_engine(global, policy)?;

    let verdict = common::estimate_jobs(engine, jobs, !global.verbose).await?;
    render::print_table(&verdict);
    println!();

    match gate(&verdict, args.yes) {
        Gate::Refuse => {
            eprintln!("Refusing to run '{}'.", args.command.join(" "));
            return Err(ExitCode(EXIT_BLOCKED).into());
        }
        Gate::Confirm => {
            let prompt = if verdict.incomplete && verdict.signal == Signal::Allow {
                "Estimate is incomplete. Run anyway?"
            } else {
                "Run anyway?"
            };
            if !confirm(prompt).await? {
                eprintln!("Aborted.");
                return Err(ExitCode(1).into());
            }
        }
        Gate::Proceed => {}
    }

    run_command(args, global).await
}

/// Run the gated command in the project directory, passing its exit code on.
async fn run_command(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    let Some((program, rest)) = args.command.split_first() else {
        anyhow::bail!("No command given");
    };
    log::debug!("Running {}", args.command.join(" "));
    let status = Command::new(program)
        .args(rest)
        .current_dir(&global.project_dir)
        .status()
        .await
        .with_context(|| format!("Failed to start '{}'", program))?;

    if !status.success() {
        return Err(ExitCode(status.code().unwrap_or(1)).into());
    }
    Ok(())
}
