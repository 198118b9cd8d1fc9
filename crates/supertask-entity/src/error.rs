//! Model-level errors.

use supertask_core::AppError;
use thiserror::Error;

/// Errors raised while decoding or validating definition models.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A trigger expression does not have 5, 6 or 7 fields.
    #[error("Invalid crontab syntax: {0}")]
    InvalidTriggerSyntax(String),
    /// A task or timetable is malformed.
    #[error("{0}")]
    Validation(String),
    /// A job store address uses a scheme without a backend.
    #[error("Unsupported job store scheme '{0}'")]
    UnsupportedStore(String),
}

impl ModelError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        match &err {
            ModelError::InvalidTriggerSyntax(_) | ModelError::Validation(_) => {
                AppError::validation(err.to_string())
            }
            ModelError::UnsupportedStore(_) => AppError::configuration(err.to_string()),
        }
    }
}
