//! Condition evaluation engine: a recursive walk over typed expression
//! trees against an [`EvaluationContext`](crate::models::EvaluationContext).

pub mod condition;
pub mod crossover;
pub mod custom;
pub mod engine;
pub mod error;
pub mod functions;
pub mod pattern;
pub mod validate;
pub mod value;

pub use condition::ConditionOutcome;
pub use custom::{CustomCondition, CustomInput, CustomVerdict};
pub use engine::{BatchControl, ConditionEvaluator};
pub use error::EvaluationError;
pub use value::{ComputedCache, ValueResolver};
