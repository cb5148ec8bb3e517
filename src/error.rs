//! Error types for the normalized store and query sync.

use thiserror::Error;

/// Main error type for store and sync operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Entity without id passed to {operation}")]
    MissingId { operation: &'static str },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("No async runtime available to run the query")]
    NoRuntime,

    #[error("Sync task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Shorthand for feed providers reporting backend failures.
    pub fn feed(message: impl Into<String>) -> Self {
        StoreError::Feed(message.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
