//! Evaluation result types handed to the signal-generation collaborator.

use crate::models::candle::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Walk-level diagnostics attached to every condition result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub intermediate: Vec<Value>,
    #[serde(default)]
    pub short_circuited: bool,
    #[serde(default)]
    pub from_cache: bool,
}

/// Where and when a condition was evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationScope {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub timeframe: Timeframe,
}

/// Outcome of evaluating one condition definition against one context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionEvaluationResult {
    pub condition_id: String,
    pub success: bool,
    pub value: f64,
    pub confidence: f64,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub details: EvaluationDetails,
    pub context: EvaluationScope,
}

impl ConditionEvaluationResult {
    pub fn is_timeout(&self) -> bool {
        self.error
            .as_deref()
            .map(|e| e.starts_with("timeout"))
            .unwrap_or(false)
    }
}

/// Aggregate over a batch of condition evaluations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEvaluationResult {
    pub results: Vec<ConditionEvaluationResult>,
    pub successes: usize,
    pub failures: usize,
    pub cache_hits: usize,
    pub short_circuits: usize,
    pub cancelled: usize,
    pub average_latency_ms: f64,
    pub max_latency_ms: u64,
}

impl BatchEvaluationResult {
    pub fn from_results(results: Vec<ConditionEvaluationResult>, cancelled: usize) -> Self {
        let successes = results.iter().filter(|r| r.success).count();
        let failures = results.len() - successes;
        let cache_hits = results.iter().filter(|r| r.details.from_cache).count();
        let short_circuits = results
            .iter()
            .filter(|r| r.details.short_circuited)
            .count();
        let max_latency_ms = results.iter().map(|r| r.execution_time_ms).max().unwrap_or(0);
        let average_latency_ms = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.execution_time_ms as f64).sum::<f64>()
                / results.len() as f64
        };
        Self {
            results,
            successes,
            failures,
            cache_hits,
            short_circuits,
            cancelled,
            average_latency_ms,
            max_latency_ms,
        }
    }
}
