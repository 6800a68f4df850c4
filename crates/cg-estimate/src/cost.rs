//! Per-job cost estimate: time estimate, cache discount and billing combined.

use crate::billing::BillingRate;
use crate::cache::{CacheDiscount, CachePrediction};
use crate::complexity::ComplexityScore;
use crate::tier::{Confidence, Tier, TimeEstimate};
use cg_core::{JobName, ThresholdConfig};
use serde::Serialize;

/// Score divisor for the at-scale projection
const SCALE_DIVISOR: f64 = 20.0;

/// Estimated cost of running one job
#[derive(Debug, Clone, Serialize)]
pub struct CostEstimate {
    pub job: JobName,

    /// Estimated run time before billing
    pub raw_seconds: f64,

    /// Run time after per-minute rounding, always a positive multiple of 60
    pub billed_seconds: u64,

    /// Dollars after any cache discount
    pub dollars: f64,

    /// Dollars before the cache discount
    pub undiscounted_dollars: f64,

    /// What the job would cost if its complexity grew into its data
    pub scaled_dollars: f64,

    pub method: Tier,
    pub confidence: Confidence,
    pub complexity: ComplexityScore,
    pub cache_probability: f64,

    /// Complexity, at-scale cost or a CROSS JOIN flags the query shape as costly
    pub expensive_pattern: bool,

    pub caveats: Vec<String>,
}

impl CostEstimate {
    pub fn cache_discount(&self) -> CacheDiscount {
        CachePrediction::new(self.cache_probability).discount()
    }
}

/// Turns time estimates into dollars for one billing rate
#[derive(Debug, Clone)]
pub struct CostModel {
    rate: BillingRate,
    complexity_warning: u8,
    scaled_cost_limit: f64,
}

impl CostModel {
    pub fn new(rate: BillingRate, thresholds: &ThresholdConfig) -> Self {
        Self {
            rate,
            complexity_warning: thresholds.complexity_warning,
            scaled_cost_limit: thresholds.scaled_cost_limit,
        }
    }

    pub fn rate(&self) -> BillingRate {
        self.rate
    }

    /// Price one job.
    ///
    /// `caveats` carries notes from earlier stages (tier fallbacks, missing
    /// statistics); discount and pattern notes are appended.
    pub fn estimate(
        &self,
        job: &JobName,
        time: &TimeEstimate,
        cache: CachePrediction,
        complexity: ComplexityScore,
        mut caveats: Vec<String>,
    ) -> CostEstimate {
        let billed = self.rate.charge(time.seconds);

        let discount = cache.discount();
        let dollars = discount.apply(billed.dollars);
        match discount {
            CacheDiscount::Full => caveats.push(format!(
                "result cache hit likely ({:.0}%), cost set to $0",
                cache.probability() * 100.0
            )),
            CacheDiscount::Partial => caveats.push(format!(
                "cache discount applied ({:.0}% hit probability, 90% off)",
                cache.probability() * 100.0
            )),
            CacheDiscount::None => {}
        }

        if time.method == Tier::Heuristic {
            caveats.push("fell back to heuristic estimate".to_string());
        }

        let scale = (complexity.value() / SCALE_DIVISOR).max(1.0);
        let scaled_dollars = self.rate.charge(time.seconds * scale).dollars;

        let cross_joins = complexity.breakdown.cross_joins;
        if cross_joins > 0 {
            caveats.push(format!("{} CROSS JOIN(s) detected", cross_joins));
        }
        let expensive_pattern = complexity.score > self.complexity_warning
            || scaled_dollars > self.scaled_cost_limit
            || cross_joins > 0;

        CostEstimate {
            job: job.clone(),
            raw_seconds: time.seconds,
            billed_seconds: billed.billed_seconds,
            dollars,
            undiscounted_dollars: billed.dollars,
            scaled_dollars,
            method: time.method,
            confidence: time.confidence,
            complexity,
            cache_probability: cache.probability(),
            expensive_pattern,
            caveats,
        }
    }
}

#[cfg(test)]
#[path = "cost_test.rs"]
mod tests;
