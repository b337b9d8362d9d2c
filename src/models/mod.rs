//! Shared data models spanning the engine layers.

pub mod candle;
pub mod context;
pub mod evaluation;
pub mod expression;
pub mod indicators;

pub use candle::{Candle, PriceType, Timeframe};
pub use context::{EvaluationContext, IndicatorSeries, MarketWindow, VariableStore};
pub use evaluation::{BatchEvaluationResult, ConditionEvaluationResult, EvaluationDetails};
pub use expression::{
    Aggregation, ComparisonOperator, ConditionDefinition, ConditionExpr, CrossoverKind,
    LogicalOperator, MarketField, MathOperator, PatternKind, Priority, ValueExpr, VariableScope,
};
pub use indicators::{IndicatorResult, IndicatorValue};
