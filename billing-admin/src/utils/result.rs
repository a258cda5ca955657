//! Unified Result Types

use super::AppError;

/// Application-level Result type
pub type AppResult<T> = Result<T, AppError>;
