//! cg-estimate - Cost estimation engine for Costguard
//!
//! Turns compiled jobs plus warehouse metadata into dollar estimates and a
//! run-level verdict:
//!
//! - [`complexity`] scores query text for risky constructs
//! - [`tier`] estimates run time from the plan, history, or heuristics
//! - [`cache`] predicts result-cache hits
//! - [`billing`] and [`cost`] turn seconds into billed dollars
//! - [`verdict`] compares estimates against the cost policy
//! - [`engine`] runs all of the above across a set of jobs

pub mod billing;
pub mod cache;
pub mod complexity;
pub mod cost;
pub mod engine;
pub mod error;
pub mod tier;
pub mod verdict;

pub use billing::{billed_minutes, BilledCost, BillingRate};
pub use cache::{CacheDiscount, CachePrediction, CachePredictor};
pub use complexity::{ComplexityBreakdown, ComplexityCategory, ComplexityScore, ComplexityScorer};
pub use cost::{CostEstimate, CostModel};
pub use engine::{CancelToken, CostEngine, ProgressHook};
pub use error::{EstimateError, EstimateResult};
pub use tier::{
    Confidence, ConfidenceLevel, Tier, TierFailure, TierInputs, TierOutcome, TierToggles,
    TimeEstimate, TimeEstimator,
};
pub use verdict::{
    evaluate, CostProjection, ResolvedThreshold, RunVerdict, Signal, SkippedJob,
    ThresholdResolver, ThresholdSource, Violation,
};
