//! Step execution errors.

use supertask_core::AppError;

/// Error from executing a task's steps.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// A step's `uses` tag has no handler.
    #[error("Unknown step type: {0}")]
    UnknownStepKind(String),

    /// An entrypoint reference is not in the callable registry.
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// The step ran and failed.
    #[error("Step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    /// A child process could not be started.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A process-lane child exited unsuccessfully.
    #[error("Task process failed: {0}")]
    ProcessFailed(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl From<ExecutionError> for AppError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Internal(inner) => inner,
            other => AppError::execution(other.to_string()),
        }
    }
}
