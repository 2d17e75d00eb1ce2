//! Error types for recall-state

use thiserror::Error;

/// Errors that can occur in the memory persistence layer
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Memory record not found
    #[error("Memory not found: {id}")]
    NotFound { id: String },

    /// Input rejected by the store before any I/O
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failure produced on purpose by a test fake
    #[error("Injected failure in {operation}")]
    Injected { operation: String },
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}
