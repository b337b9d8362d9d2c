//! Caller-registered custom conditions.
//!
//! Handlers are registered by name on the engine and referenced from
//! `ConditionExpr::Custom`. The input is an owned snapshot so sandboxed
//! handlers can run on a spawned task.

use crate::evaluator::error::EvaluationError;
use crate::models::candle::{Candle, Timeframe};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// Owned snapshot handed to a custom condition.
#[derive(Debug, Clone)]
pub struct CustomInput {
    pub params: HashMap<String, Value>,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub current: Candle,
}

/// What a custom condition reports back.
#[derive(Debug, Clone, Copy)]
pub struct CustomVerdict {
    pub success: bool,
    pub value: f64,
    pub confidence: f64,
}

impl CustomVerdict {
    pub fn pass(value: f64) -> Self {
        Self {
            success: true,
            value,
            confidence: 1.0,
        }
    }

    pub fn fail() -> Self {
        Self {
            success: false,
            value: 0.0,
            confidence: 0.0,
        }
    }
}

/// Extension seam for caller-supplied condition logic. Implementations must
/// be cheap to share (`Arc`) and tolerant of being abandoned on timeout.
#[async_trait]
pub trait CustomCondition: Send + Sync {
    async fn evaluate(&self, input: CustomInput) -> Result<CustomVerdict, EvaluationError>;
}
