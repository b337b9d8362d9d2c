//! Indicator-level errors. Only configuration is fatal: numeric edge cases
//! during streaming resolve to documented neutral defaults instead.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("invalid indicator configuration: {0}")]
    InvalidConfig(String),
}

impl IndicatorError {
    pub fn config(message: impl Into<String>) -> Self {
        IndicatorError::InvalidConfig(message.into())
    }
}
