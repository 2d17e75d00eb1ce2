//! Domain-level error taxonomy for Recall.

use recall_state::StateError;

/// Errors produced while validating host input (events and tool parameters).
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown lifecycle event: {event}")]
    UnknownEvent { event: String },

    #[error("unknown tool: {tool}")]
    UnknownTool { tool: String },

    #[error("{tool} requires parameter: {field}")]
    MissingParameter { tool: String, field: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl ValidationError {
    pub fn missing(tool: &str, field: &str) -> Self {
        ValidationError::MissingParameter {
            tool: tool.to_string(),
            field: field.to_string(),
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidParameter {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Recall domain errors.
#[derive(Debug, thiserror::Error)]
pub enum RecallError {
    #[error("memory backend unavailable: {0}")]
    Initialization(String),

    #[error("backend error: {0}")]
    Backend(#[from] StateError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for Recall domain operations.
pub type Result<T> = std::result::Result<T, RecallError>;
