//! Error types and result handling for tenant resolution.
//!
//! Separates authoritative "no such tenant" answers from transient
//! infrastructure failures so the HTTP layer can map them to 401/400 versus
//! 500 without inspecting messages.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for storage, cache and validation failures.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Persistent store operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Cache store operation failed.
    #[error("cache error: {0}")]
    Cache(String),

    /// Entity not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Constraint violation.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl CoreError {
    /// Returns whether this error comes from an unreachable or failing
    /// collaborator rather than from the request itself.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Cache(_))
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("requested entity not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::ConstraintViolation(format!("unique constraint violation: {db_err}"))
            },
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                Self::ConstraintViolation(format!("check constraint violation: {db_err}"))
            },
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for CoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Cache(err.to_string())
    }
}
