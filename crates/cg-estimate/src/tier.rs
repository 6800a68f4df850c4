//! Tiered run-time estimation.
//!
//! Tiers are tried in a fixed order: the warehouse's EXPLAIN plan, the job's
//! execution history, then heuristics over table statistics. Each attempt
//! either yields a [`TimeEstimate`] or a [`TierFailure`]; a failure moves to
//! the next enabled tier without retrying. The heuristic tier cannot fail, so
//! every job gets an estimate.

use crate::complexity::ComplexityScore;
use cg_core::{EstimationConfig, HistoricalStats, TableStatistics, ThroughputConstants};
use cg_db::{DbError, DbResult, PlanEstimate, Warehouse};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on any estimate: 30 days
pub const MAX_ESTIMATE_SECONDS: f64 = 30.0 * 24.0 * 3600.0;

/// Lower bound on any estimate
pub const MIN_ESTIMATE_SECONDS: f64 = 1.0;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Score the plan and heuristic throughputs are calibrated for
const BASELINE_SCORE: f64 = 30.0;

/// Plans tend to underestimate complex queries
const PLAN_VERY_HIGH_SCORE: u8 = 80;
const PLAN_VERY_HIGH_MULTIPLIER: f64 = 10.0;
const PLAN_HIGH_SCORE: u8 = 50;
const PLAN_HIGH_MULTIPLIER: f64 = 5.0;
const CROSS_JOIN_MULTIPLIER: f64 = 100.0;
const FULL_SCAN_MULTIPLIER: f64 = 1.5;
const UNPRUNED_PARTITION_LIMIT: u64 = 100;
const UNPRUNED_MULTIPLIER: f64 = 1.3;

const JOIN_MULTIPLIER: f64 = 1.5;
const GROUP_BY_MULTIPLIER: f64 = 3.0;
const WINDOW_FACTOR: f64 = 5.0;
const DISTINCT_MULTIPLIER: f64 = 2.0;
const ORDER_BY_FACTOR: f64 = 0.5;

const PLAN_CONFIDENCE: f64 = 0.7;
const HISTORY_BASE_CONFIDENCE: f64 = 0.3;
const HISTORY_CONFIDENCE_PER_SAMPLE: f64 = 0.06;
const HISTORY_MAX_CONFIDENCE: f64 = 0.9;
const HEURISTIC_CONFIDENCE: f64 = 0.2;

/// Estimation strategy, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Plan,
    History,
    Heuristic,
}

/// Which optional tiers may be invoked. Heuristic is always on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierToggles {
    pub plan: bool,
    pub history: bool,
}

impl Default for TierToggles {
    fn default() -> Self {
        Self {
            plan: true,
            history: true,
        }
    }
}

impl From<&EstimationConfig> for TierToggles {
    fn from(config: &EstimationConfig) -> Self {
        Self {
            plan: config.use_explain_plans,
            history: config.use_historical_data,
        }
    }
}

impl Tier {
    pub fn is_enabled(self, toggles: TierToggles) -> bool {
        match self {
            Tier::Plan => toggles.plan,
            Tier::History => toggles.history,
            Tier::Heuristic => true,
        }
    }

    /// First tier to try
    pub fn first(toggles: TierToggles) -> Tier {
        if Tier::Plan.is_enabled(toggles) {
            Tier::Plan
        } else {
            Tier::History.or_next(toggles)
        }
    }

    /// Tier to try after this one fails. `None` after the heuristic tier.
    pub fn next(self, toggles: TierToggles) -> Option<Tier> {
        match self {
            Tier::Plan => Some(Tier::History.or_next(toggles)),
            Tier::History => Some(Tier::Heuristic),
            Tier::Heuristic => None,
        }
    }

    fn or_next(self, toggles: TierToggles) -> Tier {
        if self.is_enabled(toggles) {
            self
        } else {
            self.next(toggles).unwrap_or(Tier::Heuristic)
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Plan => write!(f, "plan"),
            Tier::History => write!(f, "history"),
            Tier::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// Coarse confidence bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLevel::Low => write!(f, "Low"),
            ConfidenceLevel::Medium => write!(f, "Medium"),
            ConfidenceLevel::High => write!(f, "High"),
        }
    }
}

/// Confidence in an estimate, in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Confidence {
    pub value: f64,
    pub level: ConfidenceLevel,
}

impl Confidence {
    pub fn new(value: f64) -> Self {
        let value = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        };
        let level = if value >= 0.7 {
            ConfidenceLevel::High
        } else if value >= 0.4 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };
        Self { value, level }
    }
}

/// Raw run time produced by one tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeEstimate {
    pub seconds: f64,
    pub method: Tier,
    pub confidence: Confidence,
}

/// Why a tier produced no estimate
#[derive(Debug, Error)]
pub enum TierFailure {
    #[error("warehouse call failed: {0}")]
    Warehouse(#[from] DbError),

    #[error("warehouse call timed out after {0:?}")]
    Timeout(Duration),

    #[error("plan reported no bytes to scan")]
    ImplausiblePlan,

    #[error("no executions in the last {0} days")]
    NoHistory(u32),
}

/// What the estimator knows about one job
#[derive(Debug, Clone, Copy)]
pub struct TierInputs<'a> {
    /// Job name, for logging
    pub job: &'a str,
    pub sql: &'a str,
    pub fingerprint: &'a str,
    pub complexity: &'a ComplexityScore,
    /// Combined statistics of the referenced tables, when any were found
    pub table_stats: Option<TableStatistics>,
}

/// Estimate plus notes on the tiers that were skipped or failed
#[derive(Debug, Clone)]
pub struct TierOutcome {
    pub estimate: TimeEstimate,
    pub caveats: Vec<String>,
}

/// Runs the tier chain for one job
#[derive(Debug, Clone)]
pub struct TimeEstimator {
    toggles: TierToggles,
    history_days: u32,
    call_timeout: Duration,
    throughput: ThroughputConstants,
}

impl TimeEstimator {
    pub fn new(
        toggles: TierToggles,
        history_days: u32,
        call_timeout: Duration,
        throughput: ThroughputConstants,
    ) -> Self {
        Self {
            toggles,
            history_days,
            call_timeout,
            throughput,
        }
    }

    pub fn from_config(config: &EstimationConfig) -> Self {
        Self::new(
            TierToggles::from(config),
            config.history_days,
            Duration::from_secs(config.call_timeout_secs),
            config.constants.throughput.clone(),
        )
    }

    /// Walk the enabled tiers until one yields an estimate.
    pub async fn estimate(&self, warehouse: &dyn Warehouse, inputs: &TierInputs<'_>) -> TierOutcome {
        let mut caveats = Vec::new();
        let mut tier = Tier::first(self.toggles);

        loop {
            match self.attempt(tier, warehouse, inputs).await {
                Ok(estimate) => {
                    log::debug!(
                        "[{}] {} tier: {:.1}s",
                        inputs.job,
                        tier,
                        estimate.seconds
                    );
                    return TierOutcome { estimate, caveats };
                }
                Err(failure) => {
                    let next = tier.next(self.toggles).unwrap_or(Tier::Heuristic);
                    log::debug!(
                        "[{}] {} tier failed ({}), trying {}",
                        inputs.job,
                        tier,
                        failure,
                        next
                    );
                    caveats.push(format!("{} estimate unavailable: {}", tier, failure));
                    tier = next;
                }
            }
        }
    }

    async fn attempt(
        &self,
        tier: Tier,
        warehouse: &dyn Warehouse,
        inputs: &TierInputs<'_>,
    ) -> Result<TimeEstimate, TierFailure> {
        match tier {
            Tier::Plan => {
                let plan = self.call(warehouse.explain_plan(inputs.sql)).await?;
                if !plan.is_plausible() {
                    return Err(TierFailure::ImplausiblePlan);
                }
                Ok(TimeEstimate {
                    seconds: plan_seconds(&plan, inputs.complexity, &self.throughput),
                    method: Tier::Plan,
                    confidence: Confidence::new(PLAN_CONFIDENCE),
                })
            }
            Tier::History => {
                let stats = self
                    .call(warehouse.job_history(inputs.fingerprint, self.history_days))
                    .await?;
                if stats.is_empty() {
                    return Err(TierFailure::NoHistory(self.history_days));
                }
                Ok(TimeEstimate {
                    seconds: history_seconds(&stats),
                    method: Tier::History,
                    confidence: Confidence::new(history_confidence(stats.sample_count)),
                })
            }
            Tier::Heuristic => Ok(TimeEstimate {
                seconds: heuristic_seconds(
                    inputs.table_stats.as_ref(),
                    inputs.complexity,
                    &self.throughput,
                ),
                method: Tier::Heuristic,
                confidence: Confidence::new(HEURISTIC_CONFIDENCE),
            }),
        }
    }

    async fn call<T>(&self, fut: impl Future<Output = DbResult<T>>) -> Result<T, TierFailure> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(TierFailure::Timeout(self.call_timeout)),
        }
    }
}

fn bounded(seconds: f64) -> f64 {
    if seconds.is_nan() {
        return MAX_ESTIMATE_SECONDS;
    }
    seconds.clamp(MIN_ESTIMATE_SECONDS, MAX_ESTIMATE_SECONDS)
}

fn complexity_factor(complexity: &ComplexityScore) -> f64 {
    (complexity.value() / BASELINE_SCORE).max(1.0)
}

fn cross_join_penalty(cross_joins: u32) -> f64 {
    CROSS_JOIN_MULTIPLIER.powi(cross_joins.min(i32::MAX as u32) as i32)
}

/// Seconds implied by an EXPLAIN plan.
pub fn plan_seconds(
    plan: &PlanEstimate,
    complexity: &ComplexityScore,
    throughput: &ThroughputConstants,
) -> f64 {
    let mb = plan.bytes_scanned as f64 / BYTES_PER_MB;
    let effective_throughput = throughput.plan_mb_per_sec / complexity_factor(complexity);
    let mut seconds = mb / effective_throughput;

    if complexity.score > PLAN_VERY_HIGH_SCORE {
        seconds *= PLAN_VERY_HIGH_MULTIPLIER;
    } else if complexity.score > PLAN_HIGH_SCORE {
        seconds *= PLAN_HIGH_MULTIPLIER;
    }
    seconds *= cross_join_penalty(complexity.breakdown.cross_joins);
    if plan.full_scan {
        seconds *= FULL_SCAN_MULTIPLIER;
    }
    if !plan.partition_pruning && plan.partitions_scanned > UNPRUNED_PARTITION_LIMIT {
        seconds *= UNPRUNED_MULTIPLIER;
    }
    bounded(seconds)
}

/// Seconds implied by past executions: the median.
pub fn history_seconds(stats: &HistoricalStats) -> f64 {
    bounded(stats.median_seconds)
}

/// More samples, more confidence, capped below certainty.
pub fn history_confidence(samples: u64) -> f64 {
    (HISTORY_BASE_CONFIDENCE + HISTORY_CONFIDENCE_PER_SAMPLE * samples as f64)
        .min(HISTORY_MAX_CONFIDENCE)
}

/// Conservative seconds from table sizes and query shape.
///
/// Without statistics (or with empty tables) the estimate scales with the
/// complexity score alone, raised when the text hints at a full scan.
pub fn heuristic_seconds(
    stats: Option<&TableStatistics>,
    complexity: &ComplexityScore,
    throughput: &ThroughputConstants,
) -> f64 {
    let Some(stats) = stats.filter(|s| s.row_count > 0) else {
        let mut seconds = throughput.no_stats_base_seconds * complexity.value() / BASELINE_SCORE;
        if complexity.breakdown.full_scans > 0 {
            seconds *= FULL_SCAN_MULTIPLIER;
        }
        return bounded(seconds);
    };

    let penalty = (complexity.value() / BASELINE_SCORE).powf(1.5).max(1.0);
    let from_rows = stats.row_count as f64 / (throughput.heuristic_rows_per_sec / penalty);
    let from_bytes = stats.bytes as f64 / BYTES_PER_MB / throughput.heuristic_mb_per_sec;
    let mut seconds = from_rows.max(from_bytes);

    let b = &complexity.breakdown;
    if b.cross_joins > 0 {
        seconds *= cross_join_penalty(b.cross_joins);
    } else if b.joins > 0 {
        seconds *= JOIN_MULTIPLIER.powi(b.joins.min(i32::MAX as u32) as i32);
    }
    if b.group_bys > 0 {
        seconds *= GROUP_BY_MULTIPLIER;
    }
    if b.windows > 0 {
        seconds *= 1.0 + WINDOW_FACTOR * f64::from(b.windows);
    }
    if b.distincts > 0 {
        seconds *= DISTINCT_MULTIPLIER;
    }
    if b.order_bys > 0 {
        seconds *= 1.0 + ORDER_BY_FACTOR * f64::from(b.order_bys);
    }
    bounded(seconds)
}

#[cfg(test)]
#[path = "tier_test.rs"]
mod tests;
