//! Parse textual EXPLAIN output into a [`PlanEstimate`].
//!
//! Warehouses disagree on plan formats, so this only looks for a small set of
//! markers that most of them print somewhere:
//!
//! - byte figures with a unit (`12.5 MB`, `3 GB`, `1024 bytes`) on byte/size lines
//! - Snowflake-style `bytesAssigned=`, `partitionsAssigned=` and `partitionsTotal=`
//! - `<n> partitions` counts and `partitions: a/b` ratios
//! - pruning markers (`partition ... pruned`) and full-scan operators
//! - `Table: name` labels on scan operators
//!
//! Unrecognized lines contribute nothing.

use crate::traits::PlanEstimate;
use regex::Regex;
use std::sync::OnceLock;

const KB: f64 = 1024.0;

fn unit_bytes_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(TB|GB|MB|KB|BYTES)\b").expect("valid regex")
    })
}

fn assigned_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(bytesAssigned|partitionsAssigned|partitionsTotal)\s*=\s*(\d+)")
            .expect("valid regex")
    })
}

fn partition_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*PARTITIONS\b").expect("valid regex"))
}

fn partition_ratio_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)PARTITIONS?\s*[:=]\s*(\d+)\s*/\s*(\d+)").expect("valid regex")
    })
}

fn table_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)\bTABLE:\s*([A-Za-z0-9_."$]+)"#).expect("valid regex"))
}

fn unit_multiplier(unit: &str) -> f64 {
    match unit.to_ascii_uppercase().as_str() {
        "TB" => KB * KB * KB * KB,
        "GB" => KB * KB * KB,
        "MB" => KB * KB,
        "KB" => KB,
        _ => 1.0,
    }
}

fn parse_u64(text: &str) -> u64 {
    text.parse().unwrap_or(u64::MAX)
}

/// Parse EXPLAIN output, one plan line per item.
pub fn parse_plan_text<I, S>(lines: I) -> PlanEstimate
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut plan = PlanEstimate::default();
    let mut bytes = 0.0_f64;
    let mut assigned: Option<u64> = None;

    for line in lines {
        let line = line.as_ref();
        let upper = line.to_ascii_uppercase();

        if upper.contains("BYTES") || upper.contains("SIZE") {
            for caps in unit_bytes_re().captures_iter(line) {
                let value: f64 = caps[1].parse().unwrap_or(0.0);
                bytes += value * unit_multiplier(&caps[2]);
            }
        }

        for caps in assigned_re().captures_iter(line) {
            let value = parse_u64(&caps[2]);
            match caps[1].to_ascii_lowercase().as_str() {
                "bytesassigned" => bytes += value as f64,
                "partitionsassigned" => {
                    assigned = Some(assigned.unwrap_or(0).saturating_add(value))
                }
                _ => {
                    plan.partitions_total =
                        Some(plan.partitions_total.unwrap_or(0).saturating_add(value))
                }
            }
        }

        if let Some(caps) = partition_ratio_re().captures(line) {
            let scanned = parse_u64(&caps[1]);
            let total = parse_u64(&caps[2]);
            assigned = Some(assigned.unwrap_or(0).saturating_add(scanned));
            plan.partitions_total = Some(plan.partitions_total.unwrap_or(0).saturating_add(total));
        } else {
            for caps in partition_count_re().captures_iter(line) {
                plan.partitions_scanned = plan
                    .partitions_scanned
                    .saturating_add(parse_u64(&caps[1]));
            }
        }

        if upper.contains("PARTITION") && upper.contains("PRUN") {
            plan.partition_pruning = true;
        }

        if upper.contains("TABLESCAN")
            || upper.contains("TABLE SCAN")
            || upper.contains("TABLE_SCAN")
            || upper.contains("SEQ_SCAN")
            || upper.contains("FULL SCAN")
        {
            plan.full_scan = true;
        }

        for caps in table_label_re().captures_iter(line) {
            let name = caps[1].trim_end_matches('.').to_string();
            if !name.is_empty() && !plan.scanned_tables.contains(&name) {
                plan.scanned_tables.push(name);
            }
        }
    }

    if let Some(assigned) = assigned {
        plan.partitions_scanned = plan.partitions_scanned.saturating_add(assigned);
        if plan.partitions_total.is_some_and(|total| assigned < total) {
            plan.partition_pruning = true;
        }
    }

    // f64 -> u64 casts saturate
    plan.bytes_scanned = bytes as u64;
    plan
}

#[cfg(test)]
#[path = "explain_test.rs"]
mod tests;
