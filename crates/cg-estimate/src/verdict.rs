//! Run-level verdict: per-job estimates against the cost policy.
//!
//! Threshold resolution for a job, first hit wins:
//!
//! 1. the job's own `cost_guard_threshold`
//! 2. a policy override whose pattern is exactly the job name
//! 3. the first glob override that matches, in declaration order
//! 4. `thresholds.per_job`
//!
//! Skipped jobs (own skip flag, `skip` patterns, or a `skip: true` override)
//! are left out of every total and violation.

use crate::billing::BillingRate;
use crate::cost::CostEstimate;
use cg_core::{CompiledJob, JobName, JobOverrides, Policy};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Final decision for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// No threshold exceeded
    Allow,
    /// Thresholds exceeded; the caller should ask before running
    Warn,
    /// Thresholds exceeded and the policy treats that as fatal
    Block,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Allow => write!(f, "allow"),
            Signal::Warn => write!(f, "warn"),
            Signal::Block => write!(f, "block"),
        }
    }
}

/// Where an effective threshold came from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "pattern", rename_all = "snake_case")]
pub enum ThresholdSource {
    Job,
    ExactOverride(String),
    GlobOverride(String),
    Default,
}

impl fmt::Display for ThresholdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdSource::Job => write!(f, "job config"),
            ThresholdSource::ExactOverride(p) => write!(f, "override '{}'", p),
            ThresholdSource::GlobOverride(p) => write!(f, "override '{}'", p),
            ThresholdSource::Default => write!(f, "default"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedThreshold {
    pub dollars: f64,
    pub source: ThresholdSource,
}

/// A job whose estimate exceeds its effective threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub job: JobName,
    pub dollars: f64,
    pub threshold: f64,
}

/// A job left out of the run evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedJob {
    pub job: JobName,
    pub reason: String,
}

/// Resolves skip directives and thresholds against a policy
pub struct ThresholdResolver<'a> {
    policy: &'a Policy,
}

impl<'a> ThresholdResolver<'a> {
    pub fn new(policy: &'a Policy) -> Self {
        Self { policy }
    }

    /// Why a job is skipped, or `None` when it is evaluated.
    pub fn skip_reason(&self, name: &str, overrides: Option<&JobOverrides>) -> Option<String> {
        if overrides.is_some_and(|o| o.skip) {
            return Some("job config".to_string());
        }
        if let Some(pattern) = self.policy.skip.iter().find(|p| p.matches(name)) {
            return Some(format!("skip pattern '{}'", pattern));
        }
        self.policy
            .overrides
            .iter()
            .find(|rule| rule.skip && rule.pattern.matches(name))
            .map(|rule| format!("override '{}'", rule.pattern))
    }

    pub fn skip_reason_for(&self, job: &CompiledJob) -> Option<String> {
        self.skip_reason(&job.name, Some(&job.overrides))
    }

    /// Effective per-job threshold.
    pub fn threshold(&self, name: &str, overrides: Option<&JobOverrides>) -> ResolvedThreshold {
        if let Some(dollars) = overrides.and_then(|o| o.threshold) {
            return ResolvedThreshold {
                dollars,
                source: ThresholdSource::Job,
            };
        }

        let with_threshold = || {
            self.policy
                .overrides
                .iter()
                .filter_map(|rule| rule.threshold.map(|t| (rule, t)))
        };

        if let Some((rule, dollars)) =
            with_threshold().find(|(rule, _)| rule.pattern.as_str() == name)
        {
            return ResolvedThreshold {
                dollars,
                source: ThresholdSource::ExactOverride(rule.pattern.to_string()),
            };
        }

        if let Some((rule, dollars)) = with_threshold().find(|(rule, _)| rule.pattern.matches(name))
        {
            return ResolvedThreshold {
                dollars,
                source: ThresholdSource::GlobOverride(rule.pattern.to_string()),
            };
        }

        ResolvedThreshold {
            dollars: self.policy.thresholds.per_job,
            source: ThresholdSource::Default,
        }
    }

    pub fn threshold_for(&self, job: &CompiledJob) -> ResolvedThreshold {
        self.threshold(&job.name, Some(&job.overrides))
    }
}

/// Run cost extrapolated over common schedules
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostProjection {
    pub per_run: f64,
    /// One run a day
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
    pub yearly: f64,
    /// Two runs a day, for a year
    pub twice_daily_yearly: f64,
    /// One run an hour, for a year
    pub hourly_yearly: f64,
}

impl CostProjection {
    pub fn from_run(per_run: f64) -> Self {
        Self {
            per_run,
            daily: per_run,
            weekly: per_run * 7.0,
            monthly: per_run * 30.0,
            yearly: per_run * 365.0,
            twice_daily_yearly: per_run * 2.0 * 365.0,
            hourly_yearly: per_run * 24.0 * 365.0,
        }
    }
}

/// Outcome of evaluating one run against the policy
#[derive(Debug, Clone, Serialize)]
pub struct RunVerdict {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,

    /// Rate the run was priced at, when known
    pub rate: Option<BillingRate>,

    /// Estimates for evaluated jobs, by job name
    pub estimates: Vec<CostEstimate>,
    pub skipped: Vec<SkippedJob>,

    pub total_dollars: f64,
    pub total_threshold: f64,
    pub violations: Vec<Violation>,
    pub total_violation: bool,

    /// Some jobs did not finish estimating (cancelled or timed out)
    pub incomplete: bool,
    pub unfinished: Vec<JobName>,

    pub signal: Signal,
}

impl RunVerdict {
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty() || self.total_violation
    }

    pub fn projection(&self) -> CostProjection {
        CostProjection::from_run(self.total_dollars)
    }

    pub fn expensive_patterns(&self) -> impl Iterator<Item = &CostEstimate> {
        self.estimates.iter().filter(|e| e.expensive_pattern)
    }

    pub fn estimate(&self, job: &str) -> Option<&CostEstimate> {
        self.estimates.iter().find(|e| e.job == job)
    }
}

/// Evaluate finished estimates against the policy.
///
/// `jobs` supplies per-job overrides and the skip list; estimates for skipped
/// jobs are dropped. `unfinished` lists jobs that produced no estimate.
pub fn evaluate(
    estimates: Vec<CostEstimate>,
    jobs: &[CompiledJob],
    policy: &Policy,
    unfinished: Vec<JobName>,
) -> RunVerdict {
    let resolver = ThresholdResolver::new(policy);
    let by_name: HashMap<&str, &CompiledJob> =
        jobs.iter().map(|j| (j.name.as_str(), j)).collect();
    let overrides_of = |name: &str| by_name.get(name).map(|j| &j.overrides);

    let skipped: Vec<SkippedJob> = jobs
        .iter()
        .filter_map(|job| {
            resolver.skip_reason_for(job).map(|reason| SkippedJob {
                job: job.name.clone(),
                reason,
            })
        })
        .collect();

    let mut estimates: Vec<CostEstimate> = estimates
        .into_iter()
        .filter(|e| resolver.skip_reason(&e.job, overrides_of(e.job.as_str())).is_none())
        .collect();
    estimates.sort_by(|a, b| a.job.cmp(&b.job));

    let violations: Vec<Violation> = estimates
        .iter()
        .filter_map(|e| {
            let threshold = resolver.threshold(&e.job, overrides_of(e.job.as_str()));
            (e.dollars > threshold.dollars).then(|| Violation {
                job: e.job.clone(),
                dollars: e.dollars,
                threshold: threshold.dollars,
            })
        })
        .collect();

    let total_dollars: f64 = estimates.iter().map(|e| e.dollars).sum();
    let total_threshold = policy.thresholds.total_run;
    let total_violation = total_dollars > total_threshold;

    let signal = if violations.is_empty() && !total_violation {
        Signal::Allow
    } else if policy.thresholds.fail_on_violation {
        Signal::Block
    } else {
        Signal::Warn
    };

    let mut unfinished = unfinished;
    unfinished.sort();

    RunVerdict {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        rate: None,
        estimates,
        skipped,
        total_dollars,
        total_threshold,
        violations,
        total_violation,
        incomplete: !unfinished.is_empty(),
        unfinished,
        signal,
    }
}

#[cfg(test)]
#[path = "verdict_test.rs"]
mod tests;
