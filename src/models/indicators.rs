//! Indicator result envelope and the unified value union the evaluator reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One indicator output for one candle.
///
/// Produced once per candle per indicator; owned by that indicator instance
/// and superseded, never mutated, on each update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorResult<T> {
    pub value: T,
    pub timestamp: DateTime<Utc>,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub metadata: HashMap<String, Value>,
}

impl<T> IndicatorResult<T> {
    pub fn new(value: T, timestamp: DateTime<Utc>, is_valid: bool) -> Self {
        Self {
            value,
            timestamp,
            is_valid,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn map_value<U>(self, f: impl FnOnce(T) -> U) -> IndicatorResult<U> {
        IndicatorResult {
            value: f(self.value),
            timestamp: self.timestamp,
            is_valid: self.is_valid,
            metadata: self.metadata,
        }
    }
}

/// MACD output: line, signal, histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdOutput {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Bollinger Bands output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerOutput {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// (upper − lower) / middle; 0 when the middle band is 0.
    pub bandwidth: f64,
}

/// Parabolic SAR output. `trend` is +1 for up, −1 for down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SarOutput {
    pub value: f64,
    pub trend: i8,
    pub extreme_point: f64,
    pub acceleration: f64,
}

/// Pivot level set computed from the prior period. Variants that define
/// fewer levels (DeMark) leave the outer levels unset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotOutput {
    pub pivot: f64,
    pub r1: f64,
    pub s1: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r3: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3: Option<f64>,
}

/// Unified indicator value the evaluation context carries, so condition
/// expressions can reference any indicator through one exhaustive union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorValue {
    Scalar { value: f64 },
    Macd(MacdOutput),
    Bollinger(BollingerOutput),
    Sar(SarOutput),
    Pivots(PivotOutput),
}

impl IndicatorValue {
    /// The value an indicator reference resolves to when no field is named.
    pub fn primary(&self) -> f64 {
        match self {
            IndicatorValue::Scalar { value } => *value,
            IndicatorValue::Macd(m) => m.macd,
            IndicatorValue::Bollinger(b) => b.middle,
            IndicatorValue::Sar(s) => s.value,
            IndicatorValue::Pivots(p) => p.pivot,
        }
    }

    /// Resolve a named field of this indicator value.
    pub fn field(&self, name: &str) -> Option<f64> {
        match self {
            IndicatorValue::Scalar { value } => match name {
                "value" => Some(*value),
                _ => None,
            },
            IndicatorValue::Macd(m) => match name {
                "macd" | "value" => Some(m.macd),
                "signal" => Some(m.signal),
                "histogram" => Some(m.histogram),
                _ => None,
            },
            IndicatorValue::Bollinger(b) => match name {
                "upper" => Some(b.upper),
                "middle" | "value" => Some(b.middle),
                "lower" => Some(b.lower),
                "bandwidth" => Some(b.bandwidth),
                _ => None,
            },
            IndicatorValue::Sar(s) => match name {
                "value" => Some(s.value),
                "trend" => Some(s.trend as f64),
                "extreme_point" => Some(s.extreme_point),
                "acceleration" => Some(s.acceleration),
                _ => None,
            },
            IndicatorValue::Pivots(p) => match name {
                "pivot" | "value" => Some(p.pivot),
                "r1" => Some(p.r1),
                "s1" => Some(p.s1),
                "r2" => p.r2,
                "s2" => p.s2,
                "r3" => p.r3,
                "s3" => p.s3,
                _ => None,
            },
        }
    }
}

impl From<f64> for IndicatorValue {
    fn from(value: f64) -> Self {
        IndicatorValue::Scalar { value }
    }
}

impl From<MacdOutput> for IndicatorValue {
    fn from(value: MacdOutput) -> Self {
        IndicatorValue::Macd(value)
    }
}

impl From<BollingerOutput> for IndicatorValue {
    fn from(value: BollingerOutput) -> Self {
        IndicatorValue::Bollinger(value)
    }
}

impl From<SarOutput> for IndicatorValue {
    fn from(value: SarOutput) -> Self {
        IndicatorValue::Sar(value)
    }
}

impl From<PivotOutput> for IndicatorValue {
    fn from(value: PivotOutput) -> Self {
        IndicatorValue::Pivots(value)
    }
}
