//! cg-core - Core library for Costguard
//!
//! This crate provides the types shared by every Costguard component: compiled
//! jobs, table and history statistics, the cost policy loaded from
//! `costguard.yml`, glob patterns for policy overrides, query fingerprints and
//! the dbt manifest loader that turns compiled models into jobs.

pub mod error;
pub mod fingerprint;
pub mod job;
pub mod job_name;
pub mod manifest;
pub mod pattern;
pub mod policy;
pub mod stats;

pub use error::{CoreError, CoreResult};
pub use fingerprint::{fingerprint, is_query, normalize_sql, split_statements};
pub use job::{CompiledJob, JobOverrides, Materialization};
pub use job_name::JobName;
pub use manifest::{load_manifest_jobs, parse_manifest_jobs, select_jobs};
pub use pattern::GlobPattern;
pub use policy::{
    credits_per_hour_for_size, EstimationConfig, EstimationConstants, OverrideRule, Policy,
    ScoringWeights, ThresholdConfig, ThroughputConstants,
};
pub use stats::{HistoricalStats, TableStatistics};
