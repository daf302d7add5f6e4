//! Error types for kgm-core.

use thiserror::Error;

/// Result type alias using kgm-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during knowledge-graph operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A required parameter was missing or empty
    #[error("Missing required parameter: {param}")]
    MissingParam { param: String },

    /// A lookup target does not exist
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// The backing store was busy/locked past the lock-wait timeout.
    /// Recoverable: the caller may retry the operation.
    #[error("Store busy: {0}")]
    Busy(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a missing-parameter error.
    pub fn missing_param(param: impl Into<String>) -> Self {
        Self::MissingParam {
            param: param.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Whether this error is a recoverable lock-contention error.
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Busy(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(
                    err.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) =>
            {
                Error::Busy(e.to_string())
            }
            _ => Error::Storage(e.to_string()),
        }
    }
}
