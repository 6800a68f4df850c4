//! Result-cache hit prediction.
//!
//! A job whose identical query ran recently is likely to be answered from the
//! warehouse result cache. The prediction is the share of recent executions of
//! the same fingerprint that were cache hits; it only ever lowers a cost.

use cg_core::EstimationConfig;
use cg_db::{RecentExecution, Warehouse};
use serde::Serialize;
use std::time::Duration;

/// Above this probability the job is expected to cost nothing
pub const FULL_DISCOUNT_PROBABILITY: f64 = 0.8;

/// Above this probability the cost is discounted
pub const PARTIAL_DISCOUNT_PROBABILITY: f64 = 0.5;

/// Cost multiplier for a partial discount
pub const PARTIAL_DISCOUNT_MULTIPLIER: f64 = 0.1;

/// Probability in [0, 1] that the next execution is served from cache
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct CachePrediction(f64);

/// Discount implied by a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheDiscount {
    None,
    Partial,
    Full,
}

impl CachePrediction {
    /// No expected cache hit
    pub const NONE: CachePrediction = CachePrediction(0.0);

    /// Clamp into [0, 1]; NaN becomes 0.
    pub fn new(probability: f64) -> Self {
        if probability.is_nan() {
            return Self::NONE;
        }
        Self(probability.clamp(0.0, 1.0))
    }

    /// Share of `executions` that were cache hits; 0 when there are none.
    pub fn from_executions(executions: &[RecentExecution]) -> Self {
        if executions.is_empty() {
            return Self::NONE;
        }
        let hits = executions.iter().filter(|e| e.cache_hit).count();
        Self::new(hits as f64 / executions.len() as f64)
    }

    pub fn probability(&self) -> f64 {
        self.0
    }

    pub fn discount(&self) -> CacheDiscount {
        if self.0 > FULL_DISCOUNT_PROBABILITY {
            CacheDiscount::Full
        } else if self.0 > PARTIAL_DISCOUNT_PROBABILITY {
            CacheDiscount::Partial
        } else {
            CacheDiscount::None
        }
    }
}

impl CacheDiscount {
    pub fn multiplier(&self) -> f64 {
        match self {
            CacheDiscount::None => 1.0,
            CacheDiscount::Partial => PARTIAL_DISCOUNT_MULTIPLIER,
            CacheDiscount::Full => 0.0,
        }
    }

    /// Apply the discount to a dollar amount
    pub fn apply(&self, dollars: f64) -> f64 {
        dollars * self.multiplier()
    }
}

/// Looks up recent executions of a fingerprint and turns them into a prediction
#[derive(Debug, Clone)]
pub struct CachePredictor {
    enabled: bool,
    window_hours: u32,
    call_timeout: Duration,
}

impl CachePredictor {
    pub fn new(enabled: bool, window_hours: u32, call_timeout: Duration) -> Self {
        Self {
            enabled,
            window_hours,
            call_timeout,
        }
    }

    pub fn from_config(config: &EstimationConfig) -> Self {
        Self::new(
            config.cache_detection,
            config.cache_window_hours,
            Duration::from_secs(config.call_timeout_secs),
        )
    }

    /// Predict a cache hit for `fingerprint`. Lookup failures and timeouts
    /// predict no hit.
    pub async fn predict(&self, warehouse: &dyn Warehouse, fingerprint: &str) -> CachePrediction {
        if !self.enabled {
            return CachePrediction::NONE;
        }
        let lookup = warehouse.recent_executions(fingerprint, self.window_hours);
        match tokio::time::timeout(self.call_timeout, lookup).await {
            Ok(Ok(executions)) => CachePrediction::from_executions(&executions),
            Ok(Err(e)) => {
                log::debug!("Recent-execution lookup failed for {}: {}", fingerprint, e);
                CachePrediction::NONE
            }
            Err(_) => {
                log::debug!("Recent-execution lookup timed out for {}", fingerprint);
                CachePrediction::NONE
            }
        }
    }
}
