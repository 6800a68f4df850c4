//! Shared utilities for CLI commands.

use anyhow::{Context, Result};
use cg_core::{load_manifest_jobs, select_jobs, CompiledJob, GlobPattern, Policy};
use cg_db::{DuckDbWarehouse, WarehousePool};
use cg_estimate::{CancelToken, CostEngine, CostEstimate, RunVerdict, ThresholdResolver};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::{GlobalArgs, JobSelection};

/// Exit code when the policy blocks a run
pub(crate) const EXIT_BLOCKED: i32 = 2;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; nothing to show the user
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Load the policy from `--config` or the project directory and apply
/// command-line overrides.
pub(crate) fn load_policy(global: &GlobalArgs) -> Result<Policy> {
    let policy = match &global.config {
        Some(path) => Policy::load(Path::new(path)),
        None => Policy::load_from_dir(Path::new(&global.project_dir)),
    }
    .context("Failed to load cost policy")?;

    policy
        .with_overrides(global.cost_per_credit, global.threshold)
        .context("Invalid command-line override")
}

/// Manifest path: explicit, or `target/manifest.json` under the project.
pub(crate) fn manifest_path(global: &GlobalArgs, explicit: Option<&str>) -> PathBuf {
    match explicit {
        Some(path) => PathBuf::from(path),
        None => Path::new(&global.project_dir)
            .join("target")
            .join("manifest.json"),
    }
}

/// Parse a comma-separated list of glob patterns.
pub(crate) fn parse_patterns(list: Option<&str>) -> Result<Vec<GlobPattern>> {
    let Some(list) = list else {
        return Ok(Vec::new());
    };
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| GlobPattern::new(p).with_context(|| format!("Invalid pattern '{}'", p)))
        .collect()
}

/// Load jobs from the manifest, filtered by `--select` / `--exclude`.
pub(crate) fn load_jobs(global: &GlobalArgs, selection: &JobSelection) -> Result<Vec<CompiledJob>> {
    let path = manifest_path(global, selection.manifest.as_deref());
    let jobs = load_manifest_jobs(&path).context("Failed to load manifest")?;
    let select = parse_patterns(selection.select.as_deref())?;
    let exclude = parse_patterns(selection.exclude.as_deref())?;

    let selected = select_jobs(jobs, &select, &exclude);
    log::debug!(
        "Selected {} jobs from {}",
        selected.len(),
        path.display()
    );
    Ok(selected)
}

/// Connect to the warehouse and build an engine for `policy`.
pub(crate) fn build_engine(global: &GlobalArgs, policy: Policy) -> Result<CostEngine> {
    let warehouse = DuckDbWarehouse::new(&global.warehouse)
        .with_context(|| format!("Failed to open warehouse '{}'", global.warehouse))?;
    let pool = WarehousePool::new(Arc::new(warehouse), policy.estimation.pool_size);
    CostEngine::new(policy, pool).context("Invalid cost policy")
}

/// Jobs that will report progress: skipped jobs are never estimated.
pub(crate) fn estimated_job_count(policy: &Policy, jobs: &[CompiledJob]) -> usize {
    let resolver = ThresholdResolver::new(policy);
    jobs.iter()
        .filter(|job| resolver.skip_reason_for(job).is_none())
        .count()
}

/// Estimate `jobs`, drawing a progress bar when `show_progress` is set.
///
/// Ctrl-C stops the estimation; the verdict then covers the jobs that
/// finished and is marked incomplete.
pub(crate) async fn estimate_jobs(
    engine: CostEngine,
    jobs: Vec<CompiledJob>,
    show_progress: bool,
) -> Result<RunVerdict> {
    let progress = show_progress.then(|| {
        let pb = ProgressBar::new(estimated_job_count(engine.policy(), &jobs) as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    });

    let engine = match &progress {
        Some(pb) => {
            let pb = pb.clone();
            engine.with_progress(Arc::new(move |estimate: &CostEstimate| {
                pb.set_message(estimate.job.to_string());
                pb.inc(1);
            }))
        }
        None => engine,
    };

    let cancel = CancelToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted, reporting partial results");
                cancel.cancel();
            }
        })
    };

    let result = engine.run(jobs, &cancel).await;
    interrupt.abort();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    result.context("Estimation failed")
}
