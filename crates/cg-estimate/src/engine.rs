//! Run orchestration: estimate a set of jobs concurrently and evaluate them.

use crate::billing::BillingRate;
use crate::cache::CachePredictor;
use crate::complexity::ComplexityScorer;
use crate::cost::{CostEstimate, CostModel};
use crate::error::{EstimateError, EstimateResult};
use crate::tier::{TierInputs, TimeEstimator};
use crate::verdict::{evaluate, RunVerdict, ThresholdResolver};
use cg_core::{credits_per_hour_for_size, CompiledJob, JobName, Policy, TableStatistics};
use cg_db::{DbError, Warehouse, WarehousePool};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

/// Size assumed when nothing else says how big the warehouse is
pub const DEFAULT_WAREHOUSE_SIZE: &str = "MEDIUM";

/// Called once per finished job estimate
pub type ProgressHook = Arc<dyn Fn(&CostEstimate) + Send + Sync>;

/// Cooperative cancellation shared between the caller and in-flight jobs
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // the sender lives as long as any token, so this cannot happen
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a worker needs to price one job
struct JobContext {
    pool: WarehousePool,
    scorer: ComplexityScorer,
    time: TimeEstimator,
    cache: CachePredictor,
    model: CostModel,
    call_timeout: Duration,
}

impl JobContext {
    fn new(policy: &Policy, pool: WarehousePool, rate: BillingRate) -> Self {
        let est = &policy.estimation;
        Self {
            pool,
            scorer: ComplexityScorer::new(est.constants.weights.clone()),
            time: TimeEstimator::from_config(est),
            cache: CachePredictor::from_config(est),
            model: CostModel::new(rate, &policy.thresholds),
            call_timeout: Duration::from_secs(est.call_timeout_secs),
        }
    }

    async fn estimate(&self, job: &CompiledJob) -> EstimateResult<CostEstimate> {
        let lease = self.pool.acquire().await?;
        let warehouse: &dyn Warehouse = &*lease;
        let fingerprint = job.fingerprint();
        let mut caveats = Vec::new();

        let stats = self.table_statistics(warehouse, job, &mut caveats).await;
        let complexity = self.scorer.score(&job.sql, &stats);
        let inputs = TierInputs {
            job: job.name.as_str(),
            sql: &job.sql,
            fingerprint: &fingerprint,
            complexity: &complexity,
            table_stats: (!stats.is_empty()).then(|| TableStatistics::total(&stats)),
        };

        let outcome = self.time.estimate(warehouse, &inputs).await;
        caveats.extend(outcome.caveats);
        let cache = self.cache.predict(warehouse, &fingerprint).await;
        drop(lease);

        Ok(self
            .model
            .estimate(&job.name, &outcome.estimate, cache, complexity, caveats))
    }

    async fn table_statistics(
        &self,
        warehouse: &dyn Warehouse,
        job: &CompiledJob,
        caveats: &mut Vec<String>,
    ) -> Vec<TableStatistics> {
        let mut found = Vec::with_capacity(job.referenced_tables.len());
        for table in &job.referenced_tables {
            match tokio::time::timeout(self.call_timeout, warehouse.table_statistics(table)).await
            {
                Ok(Ok(stats)) => found.push(stats),
                Ok(Err(e)) => {
                    log::debug!("[{}] no statistics for {}: {}", job.name, table, e);
                    caveats.push(format!("no statistics for {}", table));
                }
                Err(_) => {
                    log::debug!("[{}] statistics lookup for {} timed out", job.name, table);
                    caveats.push(format!("statistics lookup for {} timed out", table));
                }
            }
        }
        found
    }
}

/// Estimates runs against one warehouse under one policy
pub struct CostEngine {
    policy: Arc<Policy>,
    pool: WarehousePool,
    progress: Option<ProgressHook>,
}

impl CostEngine {
    /// Create an engine. The policy is validated here, before any job work.
    pub fn new(policy: Policy, pool: WarehousePool) -> EstimateResult<Self> {
        policy.validate()?;
        Ok(Self {
            policy: Arc::new(policy),
            pool,
            progress: None,
        })
    }

    /// Report each finished estimate, e.g. to drive a progress bar.
    pub fn with_progress(mut self, hook: ProgressHook) -> Self {
        self.progress = Some(hook);
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Resolve the billing rate: static rate, configured size, the size the
    /// warehouse reports, then MEDIUM.
    pub async fn resolve_rate(&self) -> EstimateResult<BillingRate> {
        let policy = &self.policy;
        let credits_per_hour = if let Some(rate) = policy.warehouse_credits_per_hour {
            rate
        } else if let Some(size) = &policy.warehouse_size {
            credits_per_hour_for_size(size)?
        } else if let Some(name) = &policy.warehouse_name {
            self.detect_credits_per_hour(name).await?
        } else {
            log::debug!(
                "No warehouse size configured, assuming {}",
                DEFAULT_WAREHOUSE_SIZE
            );
            credits_per_hour_for_size(DEFAULT_WAREHOUSE_SIZE)?
        };
        BillingRate::new(credits_per_hour, policy.cost_per_credit)
    }

    async fn detect_credits_per_hour(&self, name: &str) -> EstimateResult<f64> {
        let lease = self.pool.acquire().await?;
        let timeout = Duration::from_secs(self.policy.estimation.call_timeout_secs);
        let reported = tokio::time::timeout(timeout, lease.warehouse_size(name)).await;

        let size = match reported {
            Ok(Ok(size)) => size,
            Ok(Err(e)) => {
                log::warn!(
                    "Could not detect size of warehouse '{}' ({}), assuming {}",
                    name,
                    e,
                    DEFAULT_WAREHOUSE_SIZE
                );
                DEFAULT_WAREHOUSE_SIZE.to_string()
            }
            Err(_) => {
                log::warn!(
                    "Warehouse size lookup for '{}' timed out, assuming {}",
                    name,
                    DEFAULT_WAREHOUSE_SIZE
                );
                DEFAULT_WAREHOUSE_SIZE.to_string()
            }
        };

        match credits_per_hour_for_size(&size) {
            Ok(credits) => {
                log::debug!("Warehouse '{}' is {} ({} credits/h)", name, size, credits);
                Ok(credits)
            }
            Err(e) => {
                log::warn!("{}, assuming {}", e, DEFAULT_WAREHOUSE_SIZE);
                Ok(credits_per_hour_for_size(DEFAULT_WAREHOUSE_SIZE)?)
            }
        }
    }

    /// Estimate a single job at `rate` (from [`Self::resolve_rate`]), ignoring
    /// skip directives.
    pub async fn estimate_job(
        &self,
        job: &CompiledJob,
        rate: BillingRate,
    ) -> EstimateResult<CostEstimate> {
        JobContext::new(&self.policy, self.pool.clone(), rate)
            .estimate(job)
            .await
    }

    /// Estimate every job and evaluate the run.
    ///
    /// Skipped jobs are never estimated. Cancelling `cancel`, or reaching
    /// `estimation.run_timeout_secs`, stops unfinished jobs; the verdict then
    /// covers the jobs that finished and is marked incomplete.
    pub async fn run(
        &self,
        jobs: Vec<CompiledJob>,
        cancel: &CancelToken,
    ) -> EstimateResult<RunVerdict> {
        let mut seen = HashSet::new();
        for job in &jobs {
            if !seen.insert(job.name.as_str()) {
                return Err(EstimateError::DuplicateJob(job.name.clone()));
            }
        }

        let rate = self.resolve_rate().await?;
        log::debug!(
            "Estimating {} jobs on {} at ${:.2}/h",
            jobs.len(),
            self.pool.db_type(),
            rate.dollars_per_hour()
        );

        let resolver = ThresholdResolver::new(&self.policy);
        let to_estimate: Vec<CompiledJob> = jobs
            .iter()
            .filter(|job| match resolver.skip_reason_for(job) {
                Some(reason) => {
                    log::debug!("Skipping {} ({})", job.name, reason);
                    false
                }
                None => true,
            })
            .cloned()
            .collect();

        // Child token so a run deadline never cancels the caller's token
        let stop = CancelToken::new();
        let watchdog = {
            let stop = stop.clone();
            let caller = cancel.clone();
            let deadline = self.policy.estimation.run_timeout_secs.map(Duration::from_secs);
            tokio::spawn(async move {
                let expired = async {
                    match deadline {
                        Some(limit) => tokio::time::sleep(limit).await,
                        None => std::future::pending::<()>().await,
                    }
                };
                tokio::select! {
                    _ = caller.cancelled() => log::warn!("Estimation cancelled"),
                    _ = expired => log::warn!("Estimation run timeout reached"),
                }
                stop.cancel();
            })
        };

        let ctx = Arc::new(JobContext::new(&self.policy, self.pool.clone(), rate));
        let semaphore = Arc::new(Semaphore::new(self.policy.estimation.workers));
        let mut handles = Vec::with_capacity(to_estimate.len());

        for job in to_estimate {
            let name = job.name.clone();
            let ctx = Arc::clone(&ctx);
            let semaphore = Arc::clone(&semaphore);
            let stop = stop.clone();
            let progress = self.progress.clone();

            let handle = tokio::spawn(async move {
                let work = async {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .map_err(|_| EstimateError::Warehouse(DbError::PoolClosed))?;
                    ctx.estimate(&job).await
                };
                let result = tokio::select! {
                    biased;
                    _ = stop.cancelled() => None,
                    result = work => Some(result),
                };
                if let (Some(hook), Some(Ok(estimate))) = (&progress, &result) {
                    hook(estimate);
                }
                result
            });
            handles.push((name, handle));
        }

        let mut estimates = Vec::with_capacity(handles.len());
        let mut unfinished: Vec<JobName> = Vec::new();
        for (name, handle) in handles {
            match handle.await {
                Ok(Some(Ok(estimate))) => estimates.push(estimate),
                Ok(Some(Err(e))) => {
                    log::warn!("[{}] estimate abandoned: {}", name, e);
                    unfinished.push(name);
                }
                Ok(None) => unfinished.push(name),
                Err(e) => {
                    log::warn!("[{}] estimation task failed: {}", name, e);
                    unfinished.push(name);
                }
            }
        }
        watchdog.abort();

        let mut verdict = evaluate(estimates, &jobs, &self.policy, unfinished);
        verdict.rate = Some(rate);
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_token_wakes_waiters() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        token.cancel();
        waiter.await.unwrap();
        assert!(token.is_cancelled());

        // already-cancelled tokens resolve immediately
        token.cancelled().await;
    }
}
