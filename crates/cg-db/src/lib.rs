//! cg-db - Warehouse connector layer for Costguard
//!
//! This crate provides the read-only `Warehouse` trait the estimator talks to,
//! a bounded session pool with scoped leases, the EXPLAIN text parser, and a
//! DuckDB-backed warehouse for local use.

pub mod duckdb;
pub mod error;
pub mod explain;
pub mod pool;
pub mod traits;

pub use duckdb::DuckDbWarehouse;
pub use error::{DbError, DbResult};
pub use explain::parse_plan_text;
pub use pool::{WarehouseLease, WarehousePool};
pub use traits::{PlanEstimate, RecentExecution, Warehouse};
