//! Occupancy rollover error types.
//!
//! Every store failure collapses into `RolloverError::Database`; the rollover
//! does not classify or retry by cause. The bounded `error_type()` label is
//! used for metrics.

use thiserror::Error;

/// Occupancy rollover error type.
#[derive(Debug, Error)]
pub enum RolloverError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Calendar error: {0}")]
    Calendar(String),
}

impl RolloverError {
    /// Returns a bounded label for this error (for metrics recording).
    pub fn error_type(&self) -> &'static str {
        match self {
            RolloverError::Database(_) => "database",
            RolloverError::InvalidDate(_) => "invalid_date",
            RolloverError::Calendar(_) => "calendar",
        }
    }
}

/// Convert sqlx errors to RolloverError
impl From<sqlx::Error> for RolloverError {
    fn from(err: sqlx::Error) -> Self {
        RolloverError::Database(err.to_string())
    }
}
