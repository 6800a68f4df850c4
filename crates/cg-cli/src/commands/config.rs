//! Config command implementation - shows the effective cost policy

use anyhow::{Context, Result};
use cg_core::Policy;
use std::path::Path;

use crate::cli::GlobalArgs;
use crate::commands::common;

/// Where the policy came from, for the header line
fn policy_source(global: &GlobalArgs) -> String {
    match &global.config {
        Some(path) => path.clone(),
        None => Policy::find_in_dir(Path::new(&global.project_dir))
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "built-in defaults".to_string()),
    }
}

/// Execute the config command
pub(crate) async fn execute(global: &GlobalArgs) -> Result<()> {
    let policy = common::load_policy(global)?;
    let yaml = policy.to_yaml().context("Failed to render policy")?;

    println!("# Source: {}", policy_source(global));
    if global.cost_per_credit.is_some() || global.threshold.is_some() {
        println!("# Command-line overrides applied");
    }
    if !policy.enabled {
        println!("# Cost guard is disabled; nothing will be estimated");
    }
    print!("{}", yaml);
    Ok(())
}
