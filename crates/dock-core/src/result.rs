//! Convenience result type alias for the dock host.

use crate::error::AppError;

/// A specialized `Result` type for dock operations.
pub type AppResult<T> = Result<T, AppError>;
