//! DuckDB warehouse backend
//!
//! A local stand-in for a metered warehouse. Plans come from DuckDB's own
//! EXPLAIN, table statistics from `duckdb_tables()`, and execution history
//! from the tables created by [`HISTORY_DDL`] when they exist.

use crate::error::{DbError, DbResult};
use crate::explain::parse_plan_text;
use crate::traits::{PlanEstimate, RecentExecution, Warehouse};
use async_trait::async_trait;
use cg_core::{is_query, split_statements, HistoricalStats, TableStatistics};
use chrono::{Duration, Utc};
use duckdb::{params, Connection, OptionalExt};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Tables the DuckDB backend reads execution history and warehouse sizes from.
pub const HISTORY_DDL: &str = "
CREATE TABLE IF NOT EXISTS costguard_query_history (
    fingerprint VARCHAR NOT NULL,
    started_at TIMESTAMP NOT NULL,
    elapsed_seconds DOUBLE NOT NULL,
    cache_hit BOOLEAN NOT NULL DEFAULT FALSE
);
CREATE TABLE IF NOT EXISTS costguard_warehouses (
    name VARCHAR NOT NULL,
    size VARCHAR NOT NULL
);
";

const HISTORY_TABLE: &str = "costguard_query_history";
const WAREHOUSES_TABLE: &str = "costguard_warehouses";

/// Approximate width of a column when DuckDB only reports row estimates
const BYTES_PER_VALUE: u64 = 8;

/// DuckDB warehouse backend
pub struct DuckDbWarehouse {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbWarehouse {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Open a DuckDB database file
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run setup SQL (fixtures, history tables). Not part of the read-only
    /// [`Warehouse`] surface.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))?;
        conn.execute_batch(sql)
            .map_err(|e| DbError::ExecutionError(e.to_string()))
    }

    /// Run `f` against the connection on the blocking pool so callers can
    /// time the future out without stalling the runtime.
    async fn with_connection<T, F>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| DbError::MutexPoisoned(e.to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| DbError::ExecutionError(format!("DuckDB task failed: {}", e)))?
    }
}

fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM duckdb_tables() WHERE table_name = ?",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Split `db.schema.table` into its parts, dropping identifier quotes.
fn split_relation(name: &str) -> (Option<String>, Option<String>, String) {
    let mut parts: Vec<String> = name
        .split('.')
        .map(|p| p.trim().trim_matches('"').to_string())
        .collect();
    let table = parts.pop().unwrap_or_default();
    let schema = parts.pop();
    let database = parts.pop();
    (database, schema, table)
}

fn table_statistics_on(conn: &Connection, name: &str) -> DbResult<TableStatistics> {
    let (database, schema, table) = split_relation(name);
    let row: Option<(i64, i64)> = conn
        .query_row(
            "SELECT estimated_size, column_count FROM duckdb_tables() \
             WHERE lower(table_name) = lower(?) \
               AND (CAST(? AS VARCHAR) IS NULL OR lower(schema_name) = lower(?)) \
               AND (CAST(? AS VARCHAR) IS NULL OR lower(database_name) = lower(?)) \
             LIMIT 1",
            params![table, schema, schema, database, database],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((rows, columns)) = row else {
        return Err(DbError::TableNotFound(name.to_string()));
    };
    let rows = u64::try_from(rows).unwrap_or(0);
    let columns = u64::try_from(columns).unwrap_or(0);
    Ok(TableStatistics::new(
        rows,
        rows.saturating_mul(columns).saturating_mul(BYTES_PER_VALUE),
    ))
}

/// The one query in `sql`, or a refusal. Preparing a multi-statement string
/// runs every statement but the last, so anything else never reaches DuckDB.
fn single_query(sql: &str) -> DbResult<String> {
    let mut statements = split_statements(sql);
    if statements.len() != 1 {
        return Err(DbError::RefusedStatement(format!(
            "expected exactly one statement, found {}",
            statements.len()
        )));
    }
    let statement = statements.remove(0);
    if !is_query(&statement) {
        return Err(DbError::RefusedStatement(
            "only queries can be explained".to_string(),
        ));
    }
    Ok(statement)
}

fn explain_on(conn: &Connection, sql: &str) -> DbResult<PlanEstimate> {
    let query = single_query(sql)?;
    let mut stmt = conn.prepare(&format!("EXPLAIN {}", query))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;

    let mut lines = Vec::new();
    for row in rows {
        lines.extend(row?.lines().map(str::to_string));
    }
    if lines.is_empty() {
        return Err(DbError::MalformedResponse("EXPLAIN returned no rows".into()));
    }

    let mut plan = parse_plan_text(&lines);
    if plan.bytes_scanned == 0 {
        // DuckDB plans carry no byte figures; fall back to the scanned tables' sizes
        for table in &plan.scanned_tables {
            match table_statistics_on(conn, table) {
                Ok(stats) => plan.bytes_scanned = plan.bytes_scanned.saturating_add(stats.bytes),
                Err(e) => log::debug!("No statistics for scanned table {}: {}", table, e),
            }
        }
    }
    Ok(plan)
}

fn cutoff(window: Duration) -> String {
    (Utc::now() - window).format("%Y-%m-%d %H:%M:%S").to_string()
}

#[async_trait]
impl Warehouse for DuckDbWarehouse {
    async fn explain_plan(&self, sql: &str) -> DbResult<PlanEstimate> {
        let sql = sql.to_string();
        self.with_connection(move |conn| explain_on(conn, &sql))
            .await
    }

    async fn job_history(&self, fingerprint: &str, days: u32) -> DbResult<HistoricalStats> {
        let fingerprint = fingerprint.to_string();
        let since = cutoff(Duration::days(i64::from(days)));
        self.with_connection(move |conn| {
            if !table_exists(conn, HISTORY_TABLE)? {
                log::debug!("No {} table; history is empty", HISTORY_TABLE);
                return Ok(HistoricalStats::empty());
            }
            let mut stmt = conn.prepare(
                "SELECT elapsed_seconds FROM costguard_query_history \
                 WHERE fingerprint = ? AND started_at >= CAST(? AS TIMESTAMP)",
            )?;
            let durations = stmt
                .query_map(params![fingerprint, since], |row| row.get::<_, f64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(HistoricalStats::from_durations(&durations))
        })
        .await
    }

    async fn recent_executions(
        &self,
        fingerprint: &str,
        hours: u32,
    ) -> DbResult<Vec<RecentExecution>> {
        let fingerprint = fingerprint.to_string();
        let since = cutoff(Duration::hours(i64::from(hours)));
        self.with_connection(move |conn| {
            if !table_exists(conn, HISTORY_TABLE)? {
                return Ok(Vec::new());
            }
            let mut stmt = conn.prepare(
                "SELECT cache_hit FROM costguard_query_history \
                 WHERE fingerprint = ? AND started_at >= CAST(? AS TIMESTAMP)",
            )?;
            let hits = stmt
                .query_map(params![fingerprint, since], |row| row.get::<_, bool>(0))?
                .map(|hit| hit.map(|cache_hit| RecentExecution { cache_hit }))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(hits)
        })
        .await
    }

    async fn table_statistics(&self, table: &str) -> DbResult<TableStatistics> {
        let table = table.to_string();
        self.with_connection(move |conn| table_statistics_on(conn, &table))
            .await
    }

    async fn warehouse_size(&self, name: &str) -> DbResult<String> {
        let name = name.to_string();
        self.with_connection(move |conn| {
            if !table_exists(conn, WAREHOUSES_TABLE)? {
                return Err(DbError::NotImplemented {
                    backend: "duckdb".to_string(),
                    feature: format!("warehouse sizes (no {} table)", WAREHOUSES_TABLE),
                });
            }
            conn.query_row(
                "SELECT size FROM costguard_warehouses WHERE upper(name) = upper(?) LIMIT 1",
                params![name],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("warehouse '{}'", name)))
        })
        .await
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
