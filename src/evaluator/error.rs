//! Evaluation-side errors.
//!
//! Validation failures block a single condition before its walk starts;
//! runtime failures are captured into that condition's result; timeouts are
//! reported distinctly so callers can retry with a larger budget.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("math error: {0}")]
    Math(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("unknown indicator: {0}")]
    UnknownIndicator(String),

    #[error("unknown custom condition: {0}")]
    UnknownCustomCondition(String),

    #[error("indicator {indicator_id} has no field {field}")]
    MissingField { indicator_id: String, field: String },

    #[error("insufficient history: needed {needed}, have {available}")]
    InsufficientHistory { needed: usize, available: usize },

    #[error("custom condition failed: {0}")]
    CustomFailure(String),

    #[error("timeout after {0} ms")]
    Timeout(u64),
}

impl EvaluationError {
    pub fn validation(message: impl Into<String>) -> Self {
        EvaluationError::Validation(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, EvaluationError::Timeout(_))
    }
}
