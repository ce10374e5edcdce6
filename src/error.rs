//! Error types for planning and collaborator calls

use thiserror::Error;

/// Failures raised by recipe/stock providers and the production service.
///
/// These are surfaced to the caller as-is; nothing in this crate retries.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("commit rejected: {0}")]
    Rejected(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Errors produced by the planner
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient stock for: {}", .ingredients.join(", "))]
    InsufficientStock { ingredients: Vec<String> },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("duplicate stock name '{name}' (items {first} and {second})")]
    DuplicateStock {
        name: String,
        first: String,
        second: String,
    },

    #[error("cannot {action} while {from}")]
    InvalidTransition { from: &'static str, action: &'static str },
}

impl PlannerError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        PlannerError::Validation(msg.into())
    }
}

pub type Result<T, E = PlannerError> = std::result::Result<T, E>;
