//! Error types for cg-db

use thiserror::Error;

/// Warehouse operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Warehouse connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// Table not found (D003)
    #[error("[D003] Table or view not found: {0}")]
    TableNotFound(String),

    /// Insufficient privileges (D004)
    #[error("[D004] Permission denied: {0}")]
    PermissionDenied(String),

    /// Not implemented (D005)
    #[error("[D005] Feature not implemented for {backend}: {feature}")]
    NotImplemented { backend: String, feature: String },

    /// Mutex poisoned (D006)
    #[error("[D006] Warehouse mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Response could not be interpreted (D007)
    #[error("[D007] Malformed warehouse response: {0}")]
    MalformedResponse(String),

    /// Lookup returned nothing (D008)
    #[error("[D008] Not found: {0}")]
    NotFound(String),

    /// Session pool closed (D009)
    #[error("[D009] Warehouse session pool is closed")]
    PoolClosed,

    /// Statement refused before reaching the warehouse (D010)
    #[error("[D010] Refusing to send statement: {0}")]
    RefusedStatement(String),
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error does not expose structured variants, so the message is
        // the only thing to classify on.
        let msg = err.to_string();
        if msg.contains("Table with name")
            || msg.contains("View with name")
            || msg.contains("Table or view with name")
            || (msg.contains("Catalog Error") && msg.contains("Table") && msg.contains("not found"))
        {
            DbError::TableNotFound(msg)
        } else if msg.contains("Permission") || msg.contains("permission denied") {
            DbError::PermissionDenied(msg)
        } else {
            DbError::ExecutionError(msg)
        }
    }
}
