//! Condition/value expression model supplied by strategy authors.
//!
//! Everything is an exhaustive serde-tagged union so malformed definitions
//! fail at deserialization or during the validation pass, never mid-walk.

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Scalar-producing expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum ValueExpr {
    /// A constant.
    Literal { value: f64 },
    /// A field of an indicator's cached result, optionally shifted back
    /// `offset` samples and aggregated over `aggregation_periods`.
    IndicatorRef {
        indicator_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
        #[serde(default)]
        offset: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        aggregation: Option<Aggregation>,
        #[serde(default = "default_aggregation_periods")]
        aggregation_periods: usize,
    },
    /// A candle field from the market window, `offset` samples back.
    MarketField {
        field: MarketField,
        #[serde(default)]
        offset: usize,
    },
    /// A nested mathematical expression, optionally cached under `cache_key`.
    Computed {
        operator: MathOperator,
        operands: Vec<ValueExpr>,
        #[serde(default)]
        cached: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_key: Option<String>,
    },
    /// A scoped variable; unset variables resolve to 0.0.
    Variable {
        name: String,
        #[serde(default)]
        scope: VariableScope,
    },
    /// A statically-registered built-in function applied to evaluated args.
    FunctionCall { name: String, args: Vec<ValueExpr> },
}

fn default_aggregation_periods() -> usize {
    1
}

/// Boolean-producing expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum ConditionExpr {
    Logical {
        operator: LogicalOperator,
        conditions: Vec<ConditionExpr>,
        #[serde(default = "default_true")]
        short_circuit: bool,
    },
    Comparison {
        operator: ComparisonOperator,
        left: ValueExpr,
        right: ValueExpr,
        #[serde(default)]
        tolerance: f64,
    },
    Mathematical {
        operator: MathOperator,
        operands: Vec<ValueExpr>,
        #[serde(skip_serializing_if = "Option::is_none")]
        result_variable: Option<String>,
    },
    Crossover {
        kind: CrossoverKind,
        source: ValueExpr,
        reference: ValueExpr,
        #[serde(default = "default_lookback")]
        lookback_periods: usize,
        #[serde(default = "default_confirmation")]
        confirmation_periods: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum_threshold: Option<f64>,
    },
    Pattern {
        kind: PatternKind,
        source: ValueExpr,
        #[serde(default = "default_lookback")]
        lookback_periods: usize,
        /// Minimum confidence for the condition to succeed.
        #[serde(default = "default_confidence")]
        confidence: f64,
        #[serde(default)]
        params: HashMap<String, Value>,
    },
    /// Gates the nested condition by wall-clock window; outside the window
    /// the condition is false and the nested expression is never touched.
    TimeWindow {
        start_time: NaiveTime,
        end_time: NaiveTime,
        #[serde(default)]
        days_of_week: Vec<Weekday>,
        /// Fixed offset from UTC applied before the window check.
        #[serde(default)]
        utc_offset_minutes: i32,
        condition: Box<ConditionExpr>,
    },
    /// Caller-registered logic, run under its own timeout. With `sandbox`
    /// set it executes on a spawned task as the isolation boundary.
    Custom {
        name: String,
        #[serde(default)]
        params: HashMap<String, Value>,
        #[serde(default)]
        sandbox: bool,
        #[serde(default = "default_custom_timeout")]
        timeout_ms: u64,
    },
}

fn default_true() -> bool {
    true
}

fn default_lookback() -> usize {
    5
}

fn default_confirmation() -> usize {
    1
}

fn default_confidence() -> f64 {
    0.7
}

fn default_custom_timeout() -> u64 {
    1_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
    Not,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ComparisonOperator {
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MathOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CrossoverKind {
    /// Source crosses from below to above the reference.
    CrossUp,
    /// Source crosses from above to below the reference.
    CrossDown,
    /// Either direction.
    CrossAny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PatternKind {
    HigherHighs,
    LowerLows,
    DoubleTop,
    DoubleBottom,
    HeadAndShoulders,
    AscendingTriangle,
    DescendingTriangle,
    SymmetricalTriangle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MarketField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum VariableScope {
    Session,
    Strategy,
    Global,
}

impl Default for VariableScope {
    fn default() -> Self {
        VariableScope::Session
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Aggregation {
    Min,
    Max,
    Avg,
    Sum,
    First,
    Last,
}

/// Batch dispatch order: urgent conditions run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// The unit of evaluation: an identified condition tree plus its priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionDefinition {
    pub id: String,
    pub expression: ConditionExpr,
    #[serde(default)]
    pub priority: Priority,
}

impl ConditionDefinition {
    pub fn new(id: &str, expression: ConditionExpr) -> Self {
        Self {
            id: id.to_string(),
            expression,
            priority: Priority::default(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}
