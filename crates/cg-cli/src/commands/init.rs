//! Init command implementation - writes a default cost policy

use anyhow::{Context, Result};
use cg_core::policy::POLICY_FILE_NAMES;
use cg_core::Policy;
use std::fs;
use std::path::Path;

use crate::cli::{GlobalArgs, InitArgs};

/// Default policy, every setting at its default value
pub(crate) const DEFAULT_POLICY: &str = r#"# Costguard cost policy

# Set to false to skip estimation; `costguard run` then runs the command directly
enabled: true

# Dollars per warehouse credit
cost_per_credit: 3.0

# Warehouse rate. Set one of these; otherwise the size of `warehouse_name`
# is looked up, falling back to MEDIUM (4 credits/hour).
# warehouse_credits_per_hour: 4
# warehouse_size: MEDIUM
# warehouse_name: TRANSFORMING

thresholds:
  # Dollars allowed per model and per run
  per_job: 5.0
  total_run: 5.0
  # Refuse to run instead of asking when a threshold is exceeded
  fail_on_violation: false
  # Complexity score and at-scale cost that flag an expensive pattern
  complexity_warning: 60
  scaled_cost_limit: 10.0

# Per-model overrides, first matching pattern wins
overrides: []
#  - pattern: "fct_*"
#    threshold: 20.0
#  - pattern: "tmp_*"
#    skip: true

# Models never estimated
skip: []

estimation:
  use_explain_plans: true
  use_historical_data: true
  cache_detection: true
  history_days: 30
  cache_window_hours: 24
  call_timeout_secs: 10
  # run_timeout_secs: 300
  workers: 4
  pool_size: 4
"#;

/// Execute the init command
pub(crate) async fn execute(args: &InitArgs, global: &GlobalArgs) -> Result<()> {
    let project_dir = Path::new(&global.project_dir);
    if !project_dir.is_dir() {
        anyhow::bail!("Project directory '{}' does not exist", project_dir.display());
    }

    if !args.force {
        if let Some(existing) = Policy::find_in_dir(project_dir) {
            anyhow::bail!(
                "{} already exists. Use --force to overwrite it.",
                existing.display()
            );
        }
    }

    let path = project_dir.join(POLICY_FILE_NAMES[0]);
    fs::write(&path, DEFAULT_POLICY)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Created {}", path.display());
    println!();
    println!("Next steps:");
    println!("  dbt compile              # produce target/manifest.json");
    println!("  costguard estimate       # estimate every model");

    Ok(())
}
