mod common;

use cg_core::{
    CompiledJob, GlobPattern, HistoricalStats, JobOverrides, Policy, TableStatistics,
};
use cg_db::WarehousePool;
use cg_estimate::{CancelToken, CostEngine, EstimateError, Signal, Tier};
use common::{plan_bytes, recent, Calls, Reply, ScriptedWarehouse};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MB: u64 = 1024 * 1024;

fn jobs(names: &[&str]) -> Vec<CompiledJob> {
    names
        .iter()
        .map(|name| CompiledJob::new(*name, format!("SELECT * FROM raw.{}", name)))
        .collect()
}

/// $12/h: 4 credits at $3
fn policy() -> Policy {
    let mut policy = Policy::default();
    policy.warehouse_credits_per_hour = Some(4.0);
    policy.cost_per_credit = 3.0;
    policy
}

fn engine(policy: Policy, warehouse: &Arc<ScriptedWarehouse>) -> CostEngine {
    let pool = WarehousePool::new(warehouse.clone(), policy.estimation.pool_size);
    CostEngine::new(policy, pool).unwrap()
}

#[tokio::test]
async fn test_run_prices_history_estimates_and_blocks() {
    let wh = Arc::new(ScriptedWarehouse {
        history: Reply::Ok(HistoricalStats::from_durations(&[600.0])),
        ..Default::default()
    });
    let mut p = policy();
    p.thresholds.per_job = 1.5;
    p.thresholds.total_run = 5.0;
    p.thresholds.fail_on_violation = true;

    let verdict = engine(p, &wh)
        .run(jobs(&["a", "b", "c"]), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(verdict.estimates.len(), 3);
    for est in &verdict.estimates {
        assert_eq!(est.method, Tier::History);
        assert_eq!(est.billed_seconds, 600);
        assert!((est.dollars - 2.0).abs() < 1e-9);
    }
    assert!((verdict.total_dollars - 6.0).abs() < 1e-9);
    assert_eq!(verdict.violations.len(), 3);
    assert!(verdict.total_violation);
    assert_eq!(verdict.signal, Signal::Block);
    assert!(!verdict.incomplete);
    assert_eq!(verdict.rate.map(|r| r.dollars_per_hour()), Some(12.0));
}

#[tokio::test]
async fn test_cheap_run_is_allowed() {
    let wh = Arc::new(ScriptedWarehouse {
        plan: Reply::Ok(plan_bytes(150 * MB)),
        ..Default::default()
    });
    let verdict = engine(policy(), &wh)
        .run(jobs(&["a", "b"]), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(verdict.signal, Signal::Allow);
    // 10s bills as one minute
    assert!((verdict.total_dollars - 0.4).abs() < 1e-9);
    assert_eq!(Calls::get(&wh.calls.history), 0);
}

#[tokio::test]
async fn test_skipped_jobs_are_never_estimated() {
    let wh = Arc::new(ScriptedWarehouse {
        plan: Reply::Ok(plan_bytes(150 * MB)),
        ..Default::default()
    });
    let mut p = policy();
    p.skip = vec![GlobPattern::new("tmp_*").unwrap()];

    let mut all = jobs(&["fct_orders", "tmp_scratch", "legacy"]);
    all[2].overrides = JobOverrides {
        threshold: None,
        skip: true,
    };

    let verdict = engine(p, &wh).run(all, &CancelToken::new()).await.unwrap();

    assert_eq!(Calls::get(&wh.calls.plan), 1);
    assert_eq!(Calls::get(&wh.calls.recent), 1);
    assert_eq!(verdict.estimates.len(), 1);
    assert_eq!(verdict.estimates[0].job, "fct_orders");
    assert_eq!(verdict.skipped.len(), 2);
    assert!(!verdict.incomplete);
}

#[tokio::test]
async fn test_duplicate_job_names_are_rejected() {
    let wh = Arc::new(ScriptedWarehouse::default());
    let result = engine(policy(), &wh)
        .run(jobs(&["a", "b", "a"]), &CancelToken::new())
        .await;

    assert!(matches!(result, Err(EstimateError::DuplicateJob(ref name)) if name == "a"));
    assert_eq!(Calls::get(&wh.calls.plan), 0);
}

#[tokio::test]
async fn test_invalid_policy_fails_before_any_work() {
    let wh = Arc::new(ScriptedWarehouse::default());
    let mut p = policy();
    p.estimation.workers = 0;
    let pool = WarehousePool::new(wh.clone(), 1);

    assert!(matches!(
        CostEngine::new(p, pool),
        Err(EstimateError::Policy(_))
    ));
    assert_eq!(Calls::get(&wh.calls.plan), 0);
}

#[tokio::test(start_paused = true)]
async fn test_worker_limit_bounds_concurrency() {
    let wh = Arc::new(ScriptedWarehouse {
        plan: Reply::Ok(plan_bytes(150 * MB)),
        plan_delay: Duration::from_millis(100),
        ..Default::default()
    });
    let mut p = policy();
    p.estimation.workers = 2;
    p.estimation.pool_size = 8;

    let verdict = engine(p, &wh)
        .run(jobs(&["a", "b", "c", "d", "e", "f"]), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(verdict.estimates.len(), 6);
    assert_eq!(wh.max_in_flight(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pool_size_bounds_warehouse_sessions() {
    let wh = Arc::new(ScriptedWarehouse {
        plan: Reply::Ok(plan_bytes(150 * MB)),
        plan_delay: Duration::from_millis(100),
        ..Default::default()
    });
    let mut p = policy();
    p.estimation.workers = 8;
    p.estimation.pool_size = 3;

    let verdict = engine(p, &wh)
        .run(jobs(&["a", "b", "c", "d", "e", "f"]), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(verdict.estimates.len(), 6);
    assert!(wh.max_in_flight() <= 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_marks_verdict_incomplete() {
    let wh = Arc::new(ScriptedWarehouse {
        plan: Reply::Hang,
        ..Default::default()
    });
    let engine = engine(policy(), &wh);
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });
    }

    let verdict = engine.run(jobs(&["b", "a"]), &cancel).await.unwrap();

    assert!(verdict.incomplete);
    assert!(verdict.estimates.is_empty());
    assert_eq!(verdict.unfinished.len(), 2);
    assert_eq!(verdict.unfinished[0], "a");
    assert_eq!(verdict.total_dollars, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_run_timeout_marks_verdict_incomplete() {
    let wh = Arc::new(ScriptedWarehouse {
        plan: Reply::Hang,
        ..Default::default()
    });
    let mut p = policy();
    p.estimation.run_timeout_secs = Some(2);
    let cancel = CancelToken::new();

    let verdict = engine(p, &wh).run(jobs(&["a"]), &cancel).await.unwrap();

    assert!(verdict.incomplete);
    assert_eq!(verdict.unfinished, vec![cg_core::JobName::new("a")]);
    // the deadline stops the run without touching the caller's token
    assert!(!cancel.is_cancelled());
}

#[tokio::test]
async fn test_recent_cache_hits_zero_the_cost() {
    let wh = Arc::new(ScriptedWarehouse {
        history: Reply::Ok(HistoricalStats::from_durations(&[50_000.0])),
        recent: Reply::Ok(recent(17, 3)),
        ..Default::default()
    });
    let verdict = engine(policy(), &wh)
        .run(jobs(&["a"]), &CancelToken::new())
        .await
        .unwrap();

    let est = &verdict.estimates[0];
    assert!((est.cache_probability - 0.85).abs() < 1e-9);
    assert_eq!(est.dollars, 0.0);
    assert!(est.undiscounted_dollars > 0.0);
    assert_eq!(verdict.total_dollars, 0.0);
}

#[tokio::test]
async fn test_cache_detection_off_skips_lookup() {
    let wh = Arc::new(ScriptedWarehouse {
        recent: Reply::Ok(recent(10, 0)),
        ..Default::default()
    });
    let mut p = policy();
    p.estimation.cache_detection = false;

    let verdict = engine(p, &wh)
        .run(jobs(&["a"]), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(Calls::get(&wh.calls.recent), 0);
    assert_eq!(verdict.estimates[0].cache_probability, 0.0);
}

#[tokio::test]
async fn test_table_statistics_feed_the_heuristic() {
    let mut tables = HashMap::new();
    tables.insert(
        "raw.orders".to_string(),
        TableStatistics::new(20_000_000, 100 * MB),
    );
    let wh = Arc::new(ScriptedWarehouse {
        tables,
        ..Default::default()
    });
    let mut p = policy();
    p.estimation.use_explain_plans = false;
    p.estimation.use_historical_data = false;

    let job = CompiledJob::new("fct_orders", "SELECT * FROM raw.orders JOIN raw.missing USING (id)")
        .with_tables(["raw.orders", "raw.missing"]);
    let engine = engine(p, &wh);
    let rate = engine.resolve_rate().await.unwrap();
    let est = engine.estimate_job(&job, rate).await.unwrap();

    assert_eq!(Calls::get(&wh.calls.stats), 2);
    assert_eq!(est.method, Tier::Heuristic);
    assert!(est.raw_seconds > 10_000.0);
    assert!(est
        .caveats
        .iter()
        .any(|c| c == "no statistics for raw.missing"));
}

#[tokio::test]
async fn test_progress_hook_sees_every_estimate() {
    let wh = Arc::new(ScriptedWarehouse {
        plan: Reply::Ok(plan_bytes(10 * MB)),
        ..Default::default()
    });
    let seen = Arc::new(AtomicUsize::new(0));
    let hook = {
        let seen = Arc::clone(&seen);
        Arc::new(move |_: &cg_estimate::CostEstimate| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
    };

    engine(policy(), &wh)
        .with_progress(hook)
        .run(jobs(&["a", "b", "c"]), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_rate_from_static_credits() {
    let wh = Arc::new(ScriptedWarehouse::default());
    let rate = engine(policy(), &wh).resolve_rate().await.unwrap();
    assert_eq!(rate.dollars_per_hour(), 12.0);
    assert_eq!(Calls::get(&wh.calls.size), 0);
}

#[tokio::test]
async fn test_rate_from_configured_size() {
    let wh = Arc::new(ScriptedWarehouse::default());
    let mut p = Policy::default();
    p.warehouse_size = Some("large".to_string());
    p.warehouse_name = Some("TRANSFORMING".to_string());

    let rate = engine(p, &wh).resolve_rate().await.unwrap();
    assert_eq!(rate.credits_per_hour, 8.0);
    assert_eq!(Calls::get(&wh.calls.size), 0);
}

#[tokio::test]
async fn test_rate_from_detected_size() {
    let wh = Arc::new(ScriptedWarehouse {
        size: Reply::Ok("X-LARGE".to_string()),
        ..Default::default()
    });
    let mut p = Policy::default();
    p.warehouse_name = Some("TRANSFORMING".to_string());

    let rate = engine(p, &wh).resolve_rate().await.unwrap();
    assert_eq!(rate.credits_per_hour, 16.0);
    assert_eq!(Calls::get(&wh.calls.size), 1);
}

#[tokio::test]
async fn test_single_job_estimate_reuses_resolved_rate() {
    let wh = Arc::new(ScriptedWarehouse {
        size: Reply::Ok("X-LARGE".to_string()),
        history: Reply::Ok(HistoricalStats::from_durations(&[3600.0])),
        ..Default::default()
    });
    let mut p = Policy::default();
    p.warehouse_name = Some("TRANSFORMING".to_string());
    let engine = engine(p, &wh);

    let rate = engine.resolve_rate().await.unwrap();
    let est = engine
        .estimate_job(&CompiledJob::new("fct_orders", "SELECT 1"), rate)
        .await
        .unwrap();

    assert_eq!(Calls::get(&wh.calls.size), 1);
    // one hour at 16 credits/h and $3/credit
    assert!((est.dollars - 48.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_rate_falls_back_to_medium() {
    for reply in [Reply::Fail, Reply::Ok("GIGANTIC".to_string())] {
        let wh = Arc::new(ScriptedWarehouse {
            size: reply,
            ..Default::default()
        });
        let mut p = Policy::default();
        p.warehouse_name = Some("TRANSFORMING".to_string());

        let rate = engine(p, &wh).resolve_rate().await.unwrap();
        assert_eq!(rate.credits_per_hour, 4.0);
    }

    let wh = Arc::new(ScriptedWarehouse::default());
    let rate = engine(Policy::default(), &wh).resolve_rate().await.unwrap();
    assert_eq!(rate.credits_per_hour, 4.0);
    assert_eq!(Calls::get(&wh.calls.size), 0);
}
