//! Estimate command implementation

use anyhow::Result;
use cg_estimate::Signal;

use crate::cli::{EstimateArgs, GlobalArgs, OutputFormat};
use crate::commands::common::{self, ExitCode, EXIT_BLOCKED};
use crate::commands::render;

/// Execute the estimate command
pub(crate) async fn execute(args: &EstimateArgs, global: &GlobalArgs) -> Result<()> {
    let policy = common::load_policy(global)?;
    if !policy.enabled {
        eprintln!("Cost guard is disabled in the policy; nothing estimated.");
        return Ok(());
    }

    let jobs = common::load_jobs(global, &args.selection)?;
    let engine = common::build_engine(global, policy)?;

    let show_progress = args.output == OutputFormat::Table && !global.verbose;
    let verdict = common::estimate_jobs(engine, jobs, show_progress).await?;

    match args.output {
        OutputFormat::Table => render::print_table(&verdict),
        OutputFormat::Json => render::print_json(&verdict)?,
    }

    if verdict.signal == Signal::Block {
        return Err(ExitCode(EXIT_BLOCKED).into());
    }
    Ok(())
}
