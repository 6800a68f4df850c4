//! Warehouse billing rule.
//!
//! Compute is billed per started minute with a one-minute minimum, at
//! `credits_per_hour * cost_per_credit` dollars per hour.

use crate::error::{EstimateError, EstimateResult};
use serde::Serialize;

/// Billing granularity
pub const SECONDS_PER_BILLED_MINUTE: u64 = 60;

/// Dollar rate of the warehouse a run is billed against
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BillingRate {
    pub credits_per_hour: f64,
    pub cost_per_credit: f64,
}

/// Billed time and cost for one raw duration
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BilledCost {
    pub billed_seconds: u64,
    pub dollars: f64,
}

impl BillingRate {
    /// Build a rate, rejecting non-positive or non-finite inputs.
    pub fn new(credits_per_hour: f64, cost_per_credit: f64) -> EstimateResult<Self> {
        for (label, value) in [
            ("credits_per_hour", credits_per_hour),
            ("cost_per_credit", cost_per_credit),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(EstimateError::InvalidRate(format!(
                    "{} must be positive, got {}",
                    label, value
                )));
            }
        }
        Ok(Self {
            credits_per_hour,
            cost_per_credit,
        })
    }

    pub fn dollars_per_hour(&self) -> f64 {
        self.credits_per_hour * self.cost_per_credit
    }

    /// Dollars for a whole number of billed minutes
    pub fn dollars_for_minutes(&self, minutes: u64) -> f64 {
        minutes as f64 / 60.0 * self.credits_per_hour * self.cost_per_credit
    }

    /// Apply the billing rule to a raw duration.
    pub fn charge(&self, raw_seconds: f64) -> BilledCost {
        let minutes = billed_minutes(raw_seconds);
        BilledCost {
            billed_seconds: minutes.saturating_mul(SECONDS_PER_BILLED_MINUTE),
            dollars: self.dollars_for_minutes(minutes),
        }
    }
}

/// `max(ceil(raw_seconds / 60), 1)`. Negative, NaN and infinite inputs bill one minute.
pub fn billed_minutes(raw_seconds: f64) -> u64 {
    if !raw_seconds.is_finite() || raw_seconds <= 0.0 {
        return 1;
    }
    // float -> int casts saturate
    ((raw_seconds / SECONDS_PER_BILLED_MINUTE as f64).ceil() as u64).max(1)
}

#[cfg(test)]
#[path = "billing_test.rs"]
mod tests;
