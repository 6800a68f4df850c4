//! Compiled jobs handed to the estimator by the compiler collaborator.

use crate::fingerprint::fingerprint;
use crate::job_name::JobName;
use serde::{Deserialize, Serialize};

/// Materialization kind of a compiled job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Materialization {
    /// Create a view
    #[default]
    View,
    /// Create a table
    Table,
    /// Incremental table (only process new/changed data)
    Incremental,
    /// Inlined into downstream queries, never executed on its own
    Ephemeral,
}

impl Materialization {
    /// Parse a dbt `materialized` config value, defaulting unknown kinds to table.
    pub fn from_dbt(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "view" => Materialization::View,
            "incremental" => Materialization::Incremental,
            "ephemeral" => Materialization::Ephemeral,
            _ => Materialization::Table,
        }
    }

    /// Returns true if this is an ephemeral materialization
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Materialization::Ephemeral)
    }
}

impl std::fmt::Display for Materialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Materialization::View => write!(f, "view"),
            Materialization::Table => write!(f, "table"),
            Materialization::Incremental => write!(f, "incremental"),
            Materialization::Ephemeral => write!(f, "ephemeral"),
        }
    }
}

/// Per-job policy overrides carried by the job itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobOverrides {
    /// Dollar threshold for this job, overriding every policy-level threshold
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Exclude this job from estimation and from the run verdict
    #[serde(default)]
    pub skip: bool,
}

/// One transformation unit to be costed.
///
/// Immutable for the lifetime of an estimation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledJob {
    /// Job identifier, unique within a run
    pub name: JobName,

    /// How the job is materialized
    #[serde(default)]
    pub materialization: Materialization,

    /// Compiled query text
    pub sql: String,

    /// Fully-qualified identifiers of the tables the query reads
    #[serde(default)]
    pub referenced_tables: Vec<String>,

    /// Per-job overrides
    #[serde(default)]
    pub overrides: JobOverrides,

    /// Target database, for display
    #[serde(default)]
    pub database: Option<String>,

    /// Target schema, for display
    #[serde(default)]
    pub schema: Option<String>,

    /// Relation alias, for display
    #[serde(default)]
    pub alias: Option<String>,
}

impl CompiledJob {
    /// Create a job with default overrides and no display metadata.
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: JobName::new(name),
            materialization: Materialization::default(),
            sql: sql.into(),
            referenced_tables: Vec::new(),
            overrides: JobOverrides::default(),
            database: None,
            schema: None,
            alias: None,
        }
    }

    /// Builder-style setter for referenced tables
    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.referenced_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style setter for per-job overrides
    pub fn with_overrides(mut self, overrides: JobOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Stable identifier used to match this job against past executions.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.sql)
    }

    /// `database.schema.alias` with missing parts omitted.
    pub fn relation_name(&self) -> String {
        let relation = self.alias.as_deref().unwrap_or(self.name.as_str());
        [self.database.as_deref(), self.schema.as_deref(), Some(relation)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materialization_from_dbt() {
        assert_eq!(Materialization::from_dbt("view"), Materialization::View);
        assert_eq!(Materialization::from_dbt("TABLE"), Materialization::Table);
        assert_eq!(
            Materialization::from_dbt("incremental"),
            Materialization::Incremental
        );
        assert_eq!(
            Materialization::from_dbt("ephemeral"),
            Materialization::Ephemeral
        );
        assert_eq!(
            Materialization::from_dbt("materialized_view"),
            Materialization::Table
        );
    }

    #[test]
    fn test_fingerprint_ignores_whitespace() {
        let a = CompiledJob::new("a", "SELECT 1\n  FROM t");
        let b = CompiledJob::new("b", "SELECT 1 FROM t");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_relation_name() {
        let mut job = CompiledJob::new("fct_orders", "SELECT 1");
        assert_eq!(job.relation_name(), "fct_orders");
        job.database = Some("ANALYTICS".to_string());
        job.schema = Some("MARTS".to_string());
        job.alias = Some("orders".to_string());
        assert_eq!(job.relation_name(), "ANALYTICS.MARTS.orders");
    }
}
