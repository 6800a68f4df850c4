//! Error types for cg-estimate
//!
//! Only run-level problems are errors. Anything that goes wrong while
//! estimating a single job is absorbed by the tier fallback chain.

use cg_core::{CoreError, JobName};
use cg_db::DbError;
use thiserror::Error;

/// Estimation engine errors
#[derive(Error, Debug)]
pub enum EstimateError {
    /// Policy rejected before any job work (X001)
    #[error("[X001] Invalid cost policy: {0}")]
    Policy(#[from] CoreError),

    /// Two jobs in one run share a name (X002)
    #[error("[X002] Duplicate job name in run: {0}")]
    DuplicateJob(JobName),

    /// Billing rate resolved to an unusable value (X003)
    #[error("[X003] Invalid billing rate: {0}")]
    InvalidRate(String),

    /// Warehouse pool unusable (X004)
    #[error("[X004] Warehouse unavailable: {0}")]
    Warehouse(#[from] DbError),
}

/// Result type alias for EstimateError
pub type EstimateResult<T> = Result<T, EstimateError>;
