//! Core error types for cueist-core.
//!
//! This module defines the error hierarchy using thiserror. Store failures
//! are fatal to the request that hit them; feedback errors are local and
//! recoverable with zero partial mutation.

use thiserror::Error;
use uuid::Uuid;

/// Core error type for cueist-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Feedback-related errors (recoverable, no partial mutation)
    #[error("Feedback error: {0}")]
    Feedback(#[from] FeedbackError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: std::path::PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Feedback-processing errors.
///
/// Both variants guarantee that no rule weight, belief, or log entry was
/// mutated before the error was returned.
#[derive(Error, Debug)]
pub enum FeedbackError {
    /// The referenced task rule does not exist
    #[error("Unknown task rule: {0}")]
    NotFound(Uuid),

    /// The feedback action string could not be parsed
    #[error("Invalid feedback action '{0}'. Use 'accept' or 'reject'")]
    InvalidAction(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed {
        path: std::path::PathBuf,
        message: String,
    },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed {
        path: std::path::PathBuf,
        message: String,
    },
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Time range string is not "HH:MM-HH:MM"
    #[error("Invalid time range '{0}': expected \"HH:MM-HH:MM\"")]
    InvalidTimeRange(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
