//! Error types for the grouplcm object store.

use thiserror::Error;

/// Result type alias for object store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during object store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    /// A create raced with another writer or targeted an existing name.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("owner reference error: {0}")]
    Owner(String),
}

impl StateError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StateError::AlreadyExists(_))
    }
}
