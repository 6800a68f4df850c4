//! Verdict rendering for terminal and JSON output

use anyhow::{Context, Result};
use cg_estimate::{
    BillingRate, CacheDiscount, CostEstimate, CostProjection, RunVerdict, Signal,
};
use serde::Serialize;
use std::collections::HashSet;

/// JSON document printed by `estimate --output json`
#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    verdict: &'a RunVerdict,
    projection: CostProjection,
}

pub(crate) fn print_json(verdict: &RunVerdict) -> Result<()> {
    let report = JsonReport {
        verdict,
        projection: verdict.projection(),
    };
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize verdict")?;
    println!("{}", json);
    Ok(())
}

/// `$1.23`, with more precision for sub-cent amounts
pub(crate) fn format_dollars(dollars: f64) -> String {
    if dollars > 0.0 && dollars < 0.01 {
        format!("${:.4}", dollars)
    } else {
        format!("${:.2}", dollars)
    }
}

/// `45s`, `3m 05s`, `2h 07m`
pub(crate) fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}h {:02}m", h, m)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

pub(crate) fn describe_rate(rate: &BillingRate) -> String {
    format!(
        "{}/h ({} credits/h at {}/credit)",
        format_dollars(rate.dollars_per_hour()),
        rate.credits_per_hour,
        format_dollars(rate.cost_per_credit)
    )
}

fn status(estimate: &CostEstimate, over: &HashSet<&str>) -> &'static str {
    if over.contains(estimate.job.as_str()) {
        "OVER"
    } else if estimate.cache_discount() == CacheDiscount::Full {
        "cached"
    } else {
        "ok"
    }
}

/// Print per-job estimates, totals, projections and warnings.
pub(crate) fn print_table(verdict: &RunVerdict) {
    if let Some(rate) = &verdict.rate {
        println!("Warehouse rate: {}\n", describe_rate(rate));
    }

    if verdict.estimates.is_empty() {
        println!("No jobs estimated.");
    } else {
        print_estimates(verdict);
    }

    println!();
    println!(
        "Total: {} (threshold {}){}",
        format_dollars(verdict.total_dollars),
        format_dollars(verdict.total_threshold),
        if verdict.total_violation {
            "  EXCEEDED"
        } else {
            ""
        }
    );

    let p = verdict.projection();
    println!(
        "Projected: {} daily, {} monthly, {} yearly ({} twice daily, {} hourly)",
        format_dollars(p.daily),
        format_dollars(p.monthly),
        format_dollars(p.yearly),
        format_dollars(p.twice_daily_yearly),
        format_dollars(p.hourly_yearly),
    );

    let expensive: Vec<&CostEstimate> = verdict.expensive_patterns().collect();
    if !expensive.is_empty() {
        println!("\nExpensive patterns:");
        for estimate in expensive {
            println!(
                "  {} (complexity {}, {} at scale)",
                estimate.job,
                estimate.complexity.score,
                format_dollars(estimate.scaled_dollars)
            );
            for caveat in &estimate.caveats {
                println!("    - {}", caveat);
            }
        }
    }

    if !verdict.skipped.is_empty() {
        println!("\nSkipped:");
        for skipped in &verdict.skipped {
            println!("  {} ({})", skipped.job, skipped.reason);
        }
    }

    if !verdict.violations.is_empty() {
        println!("\nOver threshold:");
        for v in &verdict.violations {
            println!(
                "  {}: {} > {}",
                v.job,
                format_dollars(v.dollars),
                format_dollars(v.threshold)
            );
        }
    }

    if verdict.incomplete {
        println!(
            "\nIncomplete: {} job(s) did not finish estimating: {}",
            verdict.unfinished.len(),
            verdict
                .unfinished
                .iter()
                .map(|j| j.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    println!("\n{}", signal_line(verdict.signal));
}

fn print_estimates(verdict: &RunVerdict) {
    let over: HashSet<&str> = verdict.violations.iter().map(|v| v.job.as_str()).collect();
    let name_width = verdict
        .estimates
        .iter()
        .map(|e| e.job.len())
        .max()
        .unwrap_or(5)
        .max(5);

    println!(
        "{:<name_width$}  {:<9}  {:<10}  {:>10}  {:>9}  {:>10}  STATUS",
        "MODEL",
        "METHOD",
        "CONFIDENCE",
        "COMPLEXITY",
        "TIME",
        "COST",
        name_width = name_width
    );
    println!(
        "{:-<name_width$}  {:-<9}  {:-<10}  {:-<10}  {:-<9}  {:-<10}  {}",
        "",
        "",
        "",
        "",
        "",
        "",
        "-".repeat(6),
        name_width = name_width
    );

    for e in &verdict.estimates {
        println!(
            "{:<name_width$}  {:<9}  {:<10}  {:>10}  {:>9}  {:>10}  {}",
            e.job,
            e.method.to_string(),
            e.confidence.level.to_string(),
            format!("{} {}", e.complexity.score, e.complexity.category),
            format_duration(e.raw_seconds),
            format_dollars(e.dollars),
            status(e, &over),
            name_width = name_width
        );
    }
}

pub(crate) fn signal_line(signal: Signal) -> &'static str {
    match signal {
        Signal::Allow => "Within budget.",
        Signal::Warn => "Cost thresholds exceeded.",
        Signal::Block => "Cost thresholds exceeded; run blocked by policy.",
    }
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
