//! Structural validation of condition trees, run before evaluation.
//!
//! Catches malformed definitions (wrong logical arity, unknown or misused
//! functions, impossible crossover windows) so they block only their own
//! condition, and never surface mid-walk.

use crate::evaluator::error::EvaluationError;
use crate::evaluator::functions;
use crate::models::expression::{ConditionExpr, LogicalOperator, ValueExpr};

pub fn validate_condition(expr: &ConditionExpr) -> Result<(), EvaluationError> {
    match expr {
        ConditionExpr::Logical {
            operator,
            conditions,
            ..
        } => {
            match operator {
                LogicalOperator::Not => {
                    if conditions.len() != 1 {
                        return Err(EvaluationError::validation(format!(
                            "NOT takes exactly one condition, got {}",
                            conditions.len()
                        )));
                    }
                }
                LogicalOperator::Xor => {
                    if conditions.len() != 2 {
                        return Err(EvaluationError::validation(format!(
                            "XOR takes exactly two conditions, got {}",
                            conditions.len()
                        )));
                    }
                }
                LogicalOperator::And | LogicalOperator::Or => {
                    if conditions.is_empty() {
                        return Err(EvaluationError::validation(
                            "logical condition needs at least one child",
                        ));
                    }
                }
            }
            for child in conditions {
                validate_condition(child)?;
            }
            Ok(())
        }
        ConditionExpr::Comparison {
            left,
            right,
            tolerance,
            ..
        } => {
            if *tolerance < 0.0 {
                return Err(EvaluationError::validation(
                    "comparison tolerance must be >= 0",
                ));
            }
            validate_value(left)?;
            validate_value(right)
        }
        ConditionExpr::Mathematical { operands, .. } => {
            if operands.is_empty() {
                return Err(EvaluationError::validation(
                    "mathematical condition needs operands",
                ));
            }
            for operand in operands {
                validate_value(operand)?;
            }
            Ok(())
        }
        ConditionExpr::Crossover {
            source,
            reference,
            lookback_periods,
            confirmation_periods,
            ..
        } => {
            if *confirmation_periods == 0 {
                return Err(EvaluationError::validation(
                    "crossover confirmation_periods must be >= 1",
                ));
            }
            if *lookback_periods < confirmation_periods + 1 {
                return Err(EvaluationError::validation(
                    "crossover lookback must cover confirmation + 1 samples",
                ));
            }
            validate_value(source)?;
            validate_value(reference)
        }
        ConditionExpr::Pattern {
            source,
            lookback_periods,
            confidence,
            ..
        } => {
            if *lookback_periods < 3 {
                return Err(EvaluationError::validation(
                    "pattern lookback must be >= 3",
                ));
            }
            if !(0.0..=1.0).contains(confidence) {
                return Err(EvaluationError::validation(
                    "pattern confidence must be within [0, 1]",
                ));
            }
            validate_value(source)
        }
        ConditionExpr::TimeWindow { condition, .. } => validate_condition(condition),
        ConditionExpr::Custom { timeout_ms, .. } => {
            if *timeout_ms == 0 {
                return Err(EvaluationError::validation(
                    "custom condition timeout must be > 0",
                ));
            }
            Ok(())
        }
    }
}

pub fn validate_value(expr: &ValueExpr) -> Result<(), EvaluationError> {
    match expr {
        ValueExpr::Literal { .. } | ValueExpr::Variable { .. } | ValueExpr::MarketField { .. } => {
            Ok(())
        }
        ValueExpr::IndicatorRef {
            aggregation,
            aggregation_periods,
            ..
        } => {
            if aggregation.is_some() && *aggregation_periods == 0 {
                return Err(EvaluationError::validation(
                    "aggregation_periods must be >= 1",
                ));
            }
            Ok(())
        }
        ValueExpr::Computed {
            operands, cached, cache_key, ..
        } => {
            if operands.is_empty() {
                return Err(EvaluationError::validation(
                    "computed expression needs operands",
                ));
            }
            if *cached && cache_key.is_none() {
                return Err(EvaluationError::validation(
                    "cached computed expression needs a cache_key",
                ));
            }
            for operand in operands {
                validate_value(operand)?;
            }
            Ok(())
        }
        ValueExpr::FunctionCall { name, args } => {
            let def = functions::lookup(name)
                .ok_or_else(|| EvaluationError::UnknownFunction(name.clone()))?;
            def.check_arity(args.len())?;
            for arg in args {
                validate_value(arg)?;
            }
            Ok(())
        }
    }
}
