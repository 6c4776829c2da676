//! Error types for alarm persistence.

use rise_core::error::RiseError;

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<StorageError> for RiseError {
    fn from(err: StorageError) -> Self {
        RiseError::Storage(err.to_string())
    }
}
