//! Warehouse trait definition

use crate::error::DbResult;
use async_trait::async_trait;
use cg_core::{HistoricalStats, TableStatistics};
use serde::Serialize;

/// What the warehouse planner expects a query to scan
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanEstimate {
    /// Bytes the plan expects to read
    pub bytes_scanned: u64,

    /// Partitions (micro-partitions, row groups) assigned to the scan
    pub partitions_scanned: u64,

    /// Partitions in the scanned tables, when the plan reports it
    pub partitions_total: Option<u64>,

    /// The plan reads at least one table without pruning
    pub full_scan: bool,

    /// The plan prunes partitions
    pub partition_pruning: bool,

    /// Tables named by scan operators
    pub scanned_tables: Vec<String>,
}

impl PlanEstimate {
    /// A plan that reports no bytes to scan cannot be converted into time.
    pub fn is_plausible(&self) -> bool {
        self.bytes_scanned > 0
    }
}

/// One execution of a fingerprint inside the recent cache window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecentExecution {
    /// The execution was answered from the result cache
    pub cache_hit: bool,
}

/// Read-only view of a metered warehouse.
///
/// Implementations must be Send + Sync; the estimator issues calls from
/// several jobs at once through a [`WarehousePool`](crate::WarehousePool).
/// None of these calls may modify warehouse state.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Ask the planner what `sql` would scan, without running it
    async fn explain_plan(&self, sql: &str) -> DbResult<PlanEstimate>;

    /// Execution statistics for a query fingerprint over the last `days` days
    async fn job_history(&self, fingerprint: &str, days: u32) -> DbResult<HistoricalStats>;

    /// Executions of a query fingerprint over the last `hours` hours
    async fn recent_executions(
        &self,
        fingerprint: &str,
        hours: u32,
    ) -> DbResult<Vec<RecentExecution>>;

    /// Row count and size of a table
    async fn table_statistics(&self, table: &str) -> DbResult<TableStatistics>;

    /// Size name (e.g. `MEDIUM`) of a named warehouse
    async fn warehouse_size(&self, name: &str) -> DbResult<String>;

    /// Warehouse type identifier for logging
    fn db_type(&self) -> &'static str;
}
