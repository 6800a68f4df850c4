//! Analyze command implementation - detailed breakdown for one model

use anyhow::{Context, Result};
use cg_core::{load_manifest_jobs, CompiledJob};
use cg_estimate::{CostEstimate, ThresholdResolver};

use crate::cli::{AnalyzeArgs, GlobalArgs};
use crate::commands::common;
use crate::commands::render::{describe_rate, format_dollars, format_duration};

/// Exact name first, then the first job whose name contains `query`.
pub(crate) fn find_job<'a>(jobs: &'a [CompiledJob], query: &str) -> Option<&'a CompiledJob> {
    jobs.iter()
        .find(|job| job.name == query)
        .or_else(|| jobs.iter().find(|job| job.name.contains(query)))
}

/// Execute the analyze command
pub(crate) async fn execute(args: &AnalyzeArgs, global: &GlobalArgs) -> Result<()> {
    let policy = common::load_policy(global)?;
    let path = common::manifest_path(global, args.manifest.as_deref());
    let jobs = load_manifest_jobs(&path).context("Failed to load manifest")?;

    let job = find_job(&jobs, &args.model)
        .with_context(|| format!("No model matching '{}' in {}", args.model, path.display()))?;
    if job.name != args.model.as_str() {
        println!("Using closest match '{}'\n", job.name);
    }

    let engine = common::build_engine(global, policy)?;
    let rate = engine.resolve_rate().await?;
    let estimate = engine.estimate_job(job, rate).await?;

    let resolver = ThresholdResolver::new(engine.policy());
    let threshold = resolver.threshold_for(job);

    println!("Model: {}", job.name);
    println!("Relation: {}", job.relation_name());
    println!("Materialization: {}", job.materialization);
    if !job.referenced_tables.is_empty() {
        println!("Reads: {}", job.referenced_tables.join(", "));
    }
    if let Some(reason) = resolver.skip_reason_for(job) {
        println!("Skipped in runs: {}", reason);
    }

    print_complexity(&estimate);

    println!("\nTime estimate");
    println!("  Method: {}", estimate.method);
    println!(
        "  Confidence: {} ({:.2})",
        estimate.confidence.level, estimate.confidence.value
    );
    println!("  Raw time: {}", format_duration(estimate.raw_seconds));
    println!("  Billed time: {}", format_duration(estimate.billed_seconds as f64));

    println!("\nCost");
    println!("  Rate: {}", describe_rate(&rate));
    println!(
        "  Cache hit probability: {:.0}%",
        estimate.cache_probability * 100.0
    );
    println!("  Before cache discount: {}", format_dollars(estimate.undiscounted_dollars));
    println!("  Estimated: {}", format_dollars(estimate.dollars));
    println!("  At scale: {}", format_dollars(estimate.scaled_dollars));
    println!(
        "  Threshold: {} ({}){}",
        format_dollars(threshold.dollars),
        threshold.source,
        if estimate.dollars > threshold.dollars {
            "  EXCEEDED"
        } else {
            ""
        }
    );

    if estimate.expensive_pattern {
        println!("\nThis model matches an expensive pattern.");
    }
    if !estimate.caveats.is_empty() {
        println!("\nNotes:");
        for caveat in &estimate.caveats {
            println!("  - {}", caveat);
        }
    }
    Ok(())
}

fn print_complexity(estimate: &CostEstimate) {
    let c = &estimate.complexity;
    let b = &c.breakdown;
    println!("\nComplexity: {} ({})", c.score, c.category);
    for (label, count) in [
        ("joins", b.joins),
        ("cross joins", b.cross_joins),
        ("window functions", b.windows),
        ("aggregations", b.aggregations),
        ("group by", b.group_bys),
        ("distinct", b.distincts),
        ("order by", b.order_bys),
        ("nesting depth", b.nesting_depth),
        ("large tables", b.large_tables),
    ] {
        if count > 0 {
            println!("  {}: {}", label, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jobs() -> Vec<CompiledJob> {
        ["fct_orders_daily", "fct_orders", "dim_users"]
            .into_iter()
            .map(|name| CompiledJob::new(name, "SELECT 1"))
            .collect()
    }

    #[test]
    fn test_exact_match_beats_substring() {
        let jobs = jobs();
        assert_eq!(find_job(&jobs, "fct_orders").unwrap().name, "fct_orders");
    }

    #[test]
    fn test_substring_fallback_takes_first() {
        let jobs = jobs();
        assert_eq!(find_job(&jobs, "orders").unwrap().name, "fct_orders_daily");
        assert_eq!(find_job(&jobs, "users").unwrap().name, "dim_users");
        assert!(find_job(&jobs, "payments").is_none());
    }
}
