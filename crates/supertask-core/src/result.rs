//! Convenience result type alias for Supertask.

use crate::error::AppError;

/// A specialized `Result` type for Supertask operations.
pub type AppResult<T> = Result<T, AppError>;
