//! Storage error types.

use thiserror::Error;

/// Storage error types.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// A record persisted in the hit log, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Monotonic insertion id.
    pub id: i64,
    /// Opaque serialized payload.
    pub data: String,
}
