//! Scripted warehouse double shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cg_core::{HistoricalStats, TableStatistics};
use cg_db::{DbError, DbResult, PlanEstimate, RecentExecution, Warehouse};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Canned answer for one kind of warehouse call
#[derive(Clone)]
pub enum Reply<T> {
    Ok(T),
    Fail,
    Hang,
}

impl<T: Clone> Reply<T> {
    async fn resolve(&self, what: &str) -> DbResult<T> {
        match self {
            Reply::Ok(value) => Ok(value.clone()),
            Reply::Fail => Err(DbError::PermissionDenied(format!("{} not allowed", what))),
            Reply::Hang => std::future::pending().await,
        }
    }
}

#[derive(Default)]
pub struct Calls {
    pub plan: AtomicUsize,
    pub history: AtomicUsize,
    pub recent: AtomicUsize,
    pub stats: AtomicUsize,
    pub size: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct ScriptedWarehouse {
    pub plan: Reply<PlanEstimate>,
    pub history: Reply<HistoricalStats>,
    pub recent: Reply<Vec<RecentExecution>>,
    pub size: Reply<String>,
    pub tables: HashMap<String, TableStatistics>,
    /// Simulated latency of every plan request
    pub plan_delay: Duration,
    pub calls: Calls,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl Default for ScriptedWarehouse {
    fn default() -> Self {
        Self {
            plan: Reply::Fail,
            history: Reply::Ok(HistoricalStats::empty()),
            recent: Reply::Ok(Vec::new()),
            size: Reply::Fail,
            tables: HashMap::new(),
            plan_delay: Duration::ZERO,
            calls: Calls::default(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl ScriptedWarehouse {
    /// Plan requests that overlapped at the busiest moment
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

pub fn plan_bytes(bytes: u64) -> PlanEstimate {
    PlanEstimate {
        bytes_scanned: bytes,
        ..PlanEstimate::default()
    }
}

pub fn recent(hits: usize, misses: usize) -> Vec<RecentExecution> {
    (0..hits + misses)
        .map(|i| RecentExecution { cache_hit: i < hits })
        .collect()
}

#[async_trait]
impl Warehouse for ScriptedWarehouse {
    async fn explain_plan(&self, _sql: &str) -> DbResult<PlanEstimate> {
        self.calls.plan.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.plan_delay.is_zero() {
            tokio::time::sleep(self.plan_delay).await;
        }
        let reply = self.plan.resolve("EXPLAIN").await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }

    async fn job_history(&self, _fingerprint: &str, _days: u32) -> DbResult<HistoricalStats> {
        self.calls.history.fetch_add(1, Ordering::SeqCst);
        self.history.resolve("query history").await
    }

    async fn recent_executions(
        &self,
        _fingerprint: &str,
        _hours: u32,
    ) -> DbResult<Vec<RecentExecution>> {
        self.calls.recent.fetch_add(1, Ordering::SeqCst);
        self.recent.resolve("recent executions").await
    }

    async fn table_statistics(&self, table: &str) -> DbResult<TableStatistics> {
        self.calls.stats.fetch_add(1, Ordering::SeqCst);
        self.tables
            .get(table)
            .copied()
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))
    }

    async fn warehouse_size(&self, _name: &str) -> DbResult<String> {
        self.calls.size.fetch_add(1, Ordering::SeqCst);
        self.size.resolve("warehouse size").await
    }

    fn db_type(&self) -> &'static str {
        "scripted"
    }
}
