use super::*;
use crate::complexity::ComplexityScorer;
use crate::tier::{Confidence, Tier};
use cg_core::{GlobPattern, OverrideRule};

fn estimate(name: &str, dollars: f64) -> CostEstimate {
    CostEstimate {
        job: JobName::new(name),
        raw_seconds: 60.0,
        billed_seconds: 60,
        dollars,
        undiscounted_dollars: dollars,
        scaled_dollars: dollars,
        method: Tier::Heuristic,
        confidence: Confidence::new(0.2),
        complexity: ComplexityScorer::default().score("SELECT 1", &[]),
        cache_probability: 0.0,
        expensive_pattern: false,
        caveats: vec![],
    }
}

fn job(name: &str) -> CompiledJob {
    CompiledJob::new(name, "SELECT 1")
}

fn rule(pattern: &str, threshold: Option<f64>, skip: bool) -> OverrideRule {
    OverrideRule {
        pattern: GlobPattern::new(pattern).unwrap(),
        threshold,
        skip,
    }
}

fn policy(per_job: f64, total: f64) -> Policy {
    let mut policy = Policy::default();
    policy.thresholds.per_job = per_job;
    policy.thresholds.total_run = total;
    policy
}

#[test]
fn test_four_five_six_dollars() {
    let jobs = [job("a"), job("b"), job("c")];
    let estimates = vec![estimate("a", 4.0), estimate("b", 5.0), estimate("c", 6.0)];
    let verdict = evaluate(estimates, &jobs, &policy(5.0, 10.0), vec![]);

    assert_eq!(verdict.total_dollars, 15.0);
    assert!(verdict.total_violation);
    assert_eq!(verdict.violations.len(), 1);
    assert_eq!(verdict.violations[0].job, "c");
    assert_eq!(verdict.violations[0].threshold, 5.0);
    assert_eq!(verdict.signal, Signal::Warn);
    assert!(!verdict.incomplete);
}

#[test]
fn test_block_only_when_fail_on_violation() {
    let jobs = [job("a")];
    let mut p = policy(1.0, 100.0);
    p.thresholds.fail_on_violation = true;
    let verdict = evaluate(vec![estimate("a", 2.0)], &jobs, &p, vec![]);
    assert_eq!(verdict.signal, Signal::Block);

    let verdict = evaluate(vec![estimate("a", 0.5)], &jobs, &p, vec![]);
    assert_eq!(verdict.signal, Signal::Allow);
    assert!(!verdict.has_violations());
}

#[test]
fn test_skipped_jobs_never_count() {
    let mut p = policy(5.0, 10.0);
    p.skip = vec![GlobPattern::new("tmp_*").unwrap()];
    p.overrides = vec![rule("legacy_*", None, true)];

    let mut flagged = job("flagged");
    flagged.overrides.skip = true;
    let jobs = [job("a"), job("tmp_debug"), job("legacy_orders"), flagged];
    let estimates = vec![
        estimate("a", 1.0),
        estimate("tmp_debug", 500.0),
        estimate("legacy_orders", 500.0),
        estimate("flagged", 500.0),
    ];
    let verdict = evaluate(estimates, &jobs, &p, vec![]);

    assert_eq!(verdict.total_dollars, 1.0);
    assert!(verdict.violations.is_empty());
    assert_eq!(verdict.signal, Signal::Allow);
    assert_eq!(verdict.estimates.len(), 1);

    let mut reasons: Vec<(&str, &str)> = verdict
        .skipped
        .iter()
        .map(|s| (s.job.as_str(), s.reason.as_str()))
        .collect();
    reasons.sort();
    assert_eq!(
        reasons,
        vec![
            ("flagged", "job config"),
            ("legacy_orders", "override 'legacy_*'"),
            ("tmp_debug", "skip pattern 'tmp_*'"),
        ]
    );
}

#[test]
fn test_threshold_resolution_order() {
    let mut p = policy(5.0, 100.0);
    p.overrides = vec![
        rule("fct_*", Some(20.0), false),
        rule("fct_*_daily", Some(30.0), false),
        rule("fct_orders_daily", Some(50.0), false),
    ];
    let resolver = ThresholdResolver::new(&p);

    // exact name wins over an earlier glob
    let t = resolver.threshold("fct_orders_daily", None);
    assert_eq!(t.dollars, 50.0);
    assert_eq!(t.source, ThresholdSource::ExactOverride("fct_orders_daily".into()));

    // first matching glob in declaration order
    let t = resolver.threshold("fct_users_daily", None);
    assert_eq!(t.dollars, 20.0);
    assert_eq!(t.source, ThresholdSource::GlobOverride("fct_*".into()));

    // job override wins over everything
    let overrides = JobOverrides {
        threshold: Some(1.0),
        skip: false,
    };
    let t = resolver.threshold("fct_orders_daily", Some(&overrides));
    assert_eq!(t.dollars, 1.0);
    assert_eq!(t.source, ThresholdSource::Job);

    let t = resolver.threshold("dim_users", None);
    assert_eq!(t.dollars, 5.0);
    assert_eq!(t.source, ThresholdSource::Default);
}

#[test]
fn test_skip_only_override_does_not_set_threshold() {
    let mut p = policy(5.0, 100.0);
    p.overrides = vec![rule("stg_*", None, true), rule("*", Some(9.0), false)];
    let t = ThresholdResolver::new(&p).threshold("stg_users", None);
    assert_eq!(t.dollars, 9.0);
}

#[test]
fn test_override_thresholds_drive_violations() {
    let mut p = policy(5.0, 1000.0);
    p.overrides = vec![rule("big_*", Some(100.0), false)];
    let jobs = [job("big_table"), job("small")];
    let verdict = evaluate(
        vec![estimate("big_table", 50.0), estimate("small", 6.0)],
        &jobs,
        &p,
        vec![],
    );
    assert_eq!(verdict.violations.len(), 1);
    assert_eq!(verdict.violations[0].job, "small");
    assert!(!verdict.total_violation);
}

#[test]
fn test_incomplete_run_keeps_partial_totals() {
    let jobs = [job("a"), job("b"), job("c")];
    let verdict = evaluate(
        vec![estimate("a", 8.0)],
        &jobs,
        &policy(5.0, 10.0),
        vec![JobName::new("c"), JobName::new("b")],
    );
    assert!(verdict.incomplete);
    assert_eq!(verdict.unfinished, vec![JobName::new("b"), JobName::new("c")]);
    assert_eq!(verdict.total_dollars, 8.0);
    assert_eq!(verdict.signal, Signal::Warn);
}

#[test]
fn test_estimates_sorted_by_job() {
    let jobs = [job("b"), job("a")];
    let verdict = evaluate(
        vec![estimate("b", 1.0), estimate("a", 1.0)],
        &jobs,
        &policy(5.0, 10.0),
        vec![],
    );
    let names: Vec<&str> = verdict.estimates.iter().map(|e| e.job.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert!(verdict.estimate("a").is_some());
    assert!(verdict.estimate("zzz").is_none());
}

#[test]
fn test_projection() {
    let p = CostProjection::from_run(2.0);
    assert_eq!(p.daily, 2.0);
    assert_eq!(p.weekly, 14.0);
    assert_eq!(p.monthly, 60.0);
    assert_eq!(p.yearly, 730.0);
    assert_eq!(p.twice_daily_yearly, 1460.0);
    assert_eq!(p.hourly_yearly, 17520.0);
}

#[test]
fn test_verdict_serializes() {
    let jobs = [job("a")];
    let verdict = evaluate(vec![estimate("a", 1.0)], &jobs, &policy(5.0, 10.0), vec![]);
    let json = serde_json::to_value(&verdict).unwrap();
    assert_eq!(json["signal"], "allow");
    assert_eq!(json["estimates"][0]["job"], "a");
    assert_eq!(json["estimates"][0]["method"], "heuristic");
}
