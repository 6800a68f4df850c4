//! Error types for cg-core

use thiserror::Error;

/// Core error type for Costguard
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Configuration file not found
    #[error("[C001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// C002: Invalid configuration value
    #[error("[C002] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C003: Malformed glob pattern in an override or skip list
    #[error("[C003] Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// C004: Unknown warehouse size
    #[error("[C004] Unknown warehouse size '{size}'")]
    UnknownWarehouseSize { size: String },

    /// C005: Manifest file not found
    #[error("[C005] Manifest not found: {path}. Run `dbt compile` first.")]
    ManifestNotFound { path: String },

    /// C006: Manifest could not be interpreted
    #[error("[C006] Invalid manifest {path}: {message}")]
    ManifestInvalid { path: String, message: String },

    /// C007: IO error with file path context
    #[error("[C007] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// C008: YAML parse error
    #[error("[C008] Config parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// C009: JSON parse error
    #[error("[C009] JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
