//! 统一错误处理
//!
//! [`AppError`] is the error surface handed to the presentation layer.
//!
//! | Variant | Raised | User sees |
//! |---------|--------|-----------|
//! | `Validation` | before any write | every violation |
//! | `Conflict` | before / at write time | which field conflicted |
//! | `Dependency` | before the delete transaction | blocking categories with counts |
//! | `Persistence` | inside a transaction (rolled back) | generic message |
//! | `NotFound` | at the boundary | not-found message |
//! | `Forbidden` | capability check | permission message |

use serde::Serialize;
use tracing::error;

use crate::db::repository::{RepoError, UniqueField};

/// Message shown to users for any persistence failure
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred. Please try again.";

/// Field that caused a uniqueness conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictField {
    Name,
    Code,
}

impl From<UniqueField> for ConflictField {
    fn from(field: UniqueField) -> Self {
        match field {
            UniqueField::Name => ConflictField::Name,
            UniqueField::Code => ConflictField::Code,
        }
    }
}

/// 应用错误枚举
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Conflict on {field:?}: {message}")]
    Conflict {
        field: ConflictField,
        message: String,
    },

    #[error("Dependency error: {0}")]
    Dependency(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    Forbidden(String),
}

// ========== Helper Constructors ==========

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    pub fn conflict(field: ConflictField, message: impl Into<String>) -> Self {
        Self::Conflict {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Messages safe to display to the end user
    ///
    /// Persistence detail never leaves this crate; it is logged where the
    /// error is raised.
    pub fn user_messages(&self) -> Vec<String> {
        match self {
            AppError::Validation(violations) => violations.clone(),
            AppError::Persistence(_) => vec![GENERIC_FAILURE_MESSAGE.to_string()],
            AppError::Conflict { message, .. }
            | AppError::Dependency(message)
            | AppError::NotFound(message)
            | AppError::Forbidden(message) => vec![message.clone()],
        }
    }

    /// First user-facing message
    pub fn user_message(&self) -> String {
        self.user_messages()
            .into_iter()
            .next()
            .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string())
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, AppError::Persistence(_))
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::NotFound(msg),
            RepoError::UniqueViolation(field) => {
                let message = match field {
                    UniqueField::Name => "A record with this name already exists",
                    UniqueField::Code => "A record with this code already exists",
                };
                AppError::conflict(field.into(), message)
            }
            RepoError::Database(msg) => {
                error!(target: "database", error = %msg, "Database error occurred");
                AppError::Persistence(msg)
            }
        }
    }
}
