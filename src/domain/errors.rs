//! Domain-specific error types

use thiserror::Error;

/// Domain-level errors for lookup targets and signals
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid input for field {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Unsupported target type: {value}")]
    UnsupportedTargetType { value: String },
}

impl DomainError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        DomainError::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
