//! Value-expression resolution: every `ValueExpr` variant down to a scalar.

use crate::evaluator::error::EvaluationError;
use crate::evaluator::functions;
use crate::models::context::EvaluationContext;
use crate::models::expression::{Aggregation, MathOperator, ValueExpr};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// TTL cache for computed sub-expressions, keyed by the author-supplied
/// `cache_key`. Shared across evaluations of the owning engine.
#[derive(Debug, Default)]
pub struct ComputedCache {
    entries: Mutex<HashMap<String, (f64, DateTime<Utc>)>>,
    ttl_ms: i64,
}

impl ComputedCache {
    pub fn new(ttl_ms: i64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms,
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        let entries = self.entries.lock().ok()?;
        let (value, cached_at) = entries.get(key)?;
        if Utc::now().signed_duration_since(*cached_at) < Duration::milliseconds(self.ttl_ms) {
            Some(*value)
        } else {
            None
        }
    }

    pub fn put(&self, key: &str, value: f64) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), (value, Utc::now()));
        }
    }

    pub fn invalidate(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

/// Apply one step of a left-to-right mathematical fold.
pub fn apply_math(op: MathOperator, acc: f64, operand: f64) -> Result<f64, EvaluationError> {
    match op {
        MathOperator::Add => Ok(acc + operand),
        MathOperator::Subtract => Ok(acc - operand),
        MathOperator::Multiply => Ok(acc * operand),
        MathOperator::Divide => {
            if operand == 0.0 {
                Err(EvaluationError::DivisionByZero)
            } else {
                Ok(acc / operand)
            }
        }
        MathOperator::Modulo => {
            if operand == 0.0 {
                Err(EvaluationError::DivisionByZero)
            } else {
                Ok(acc % operand)
            }
        }
        MathOperator::Power => Ok(acc.powf(operand)),
    }
}

/// Resolves value expressions against one evaluation context.
///
/// `resolve_at` shifts every history-bearing leaf (indicator references,
/// market fields) back by `shift` extra samples, which is how the crossover
/// and pattern detectors read a series through the same dispatch.
pub struct ValueResolver<'a> {
    ctx: &'a EvaluationContext,
    computed_cache: Option<&'a ComputedCache>,
}

impl<'a> ValueResolver<'a> {
    pub fn new(ctx: &'a EvaluationContext) -> Self {
        Self {
            ctx,
            computed_cache: None,
        }
    }

    pub fn with_computed_cache(ctx: &'a EvaluationContext, cache: &'a ComputedCache) -> Self {
        Self {
            ctx,
            computed_cache: Some(cache),
        }
    }

    pub fn context(&self) -> &'a EvaluationContext {
        self.ctx
    }

    pub fn resolve(&self, expr: &ValueExpr) -> Result<f64, EvaluationError> {
        self.resolve_at(expr, 0)
    }

    pub fn resolve_at(&self, expr: &ValueExpr, shift: usize) -> Result<f64, EvaluationError> {
        match expr {
            ValueExpr::Literal { value } => Ok(*value),
            ValueExpr::Variable { name, scope } => Ok(self.ctx.variables.get(name, *scope)),
            ValueExpr::MarketField { field, offset } => self
                .ctx
                .market
                .field_at(*field, offset + shift)
                .ok_or(EvaluationError::InsufficientHistory {
                    needed: offset + shift,
                    available: self.ctx.market.history.len(),
                }),
            ValueExpr::IndicatorRef {
                indicator_id,
                field,
                offset,
                aggregation,
                aggregation_periods,
            } => self.resolve_indicator(
                indicator_id,
                field.as_deref(),
                offset + shift,
                *aggregation,
                *aggregation_periods,
            ),
            ValueExpr::Computed {
                operator,
                operands,
                cached,
                cache_key,
            } => {
                // Cache lookups only make sense for the unshifted value.
                let key = if *cached && shift == 0 {
                    cache_key.as_deref()
                } else {
                    None
                };
                if let (Some(key), Some(cache)) = (key, self.computed_cache) {
                    if let Some(hit) = cache.get(key) {
                        return Ok(hit);
                    }
                }
                let value = self.fold(*operator, operands, shift)?;
                if let (Some(key), Some(cache)) = (key, self.computed_cache) {
                    cache.put(key, value);
                }
                Ok(value)
            }
            ValueExpr::FunctionCall { name, args } => {
                let def = functions::lookup(name)
                    .ok_or_else(|| EvaluationError::UnknownFunction(name.clone()))?;
                def.check_arity(args.len())?;
                let values = args
                    .iter()
                    .map(|arg| self.resolve_at(arg, shift))
                    .collect::<Result<Vec<f64>, EvaluationError>>()?;
                def.apply(&values)
            }
        }
    }

    /// Left-to-right fold of `operands` under `operator`.
    pub fn fold(
        &self,
        operator: MathOperator,
        operands: &[ValueExpr],
        shift: usize,
    ) -> Result<f64, EvaluationError> {
        let mut iter = operands.iter();
        let first = iter
            .next()
            .ok_or_else(|| EvaluationError::validation("mathematical expression needs operands"))?;
        let mut acc = self.resolve_at(first, shift)?;
        for operand in iter {
            let value = self.resolve_at(operand, shift)?;
            acc = apply_math(operator, acc, value)?;
        }
        Ok(acc)
    }

    fn resolve_indicator(
        &self,
        indicator_id: &str,
        field: Option<&str>,
        offset: usize,
        aggregation: Option<Aggregation>,
        aggregation_periods: usize,
    ) -> Result<f64, EvaluationError> {
        let series = self
            .ctx
            .indicator(indicator_id)
            .ok_or_else(|| EvaluationError::UnknownIndicator(indicator_id.to_string()))?;

        let extract = |offset: usize| -> Result<f64, EvaluationError> {
            let result = series.at_offset(offset).ok_or(
                EvaluationError::InsufficientHistory {
                    needed: offset + 1,
                    available: series.len(),
                },
            )?;
            match field {
                Some(name) => {
                    result
                        .value
                        .field(name)
                        .ok_or_else(|| EvaluationError::MissingField {
                            indicator_id: indicator_id.to_string(),
                            field: name.to_string(),
                        })
                }
                None => Ok(result.value.primary()),
            }
        };

        match aggregation {
            None => extract(offset),
            Some(agg) => {
                let periods = aggregation_periods.max(1);
                let mut values = Vec::with_capacity(periods);
                for i in 0..periods {
                    values.push(extract(offset + i)?);
                }
                // values[0] is the newest sample of the aggregated span.
                Ok(match agg {
                    Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
                    Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    Aggregation::Sum => values.iter().sum(),
                    Aggregation::Avg => values.iter().sum::<f64>() / values.len() as f64,
                    Aggregation::First => values[values.len() - 1],
                    Aggregation::Last => values[0],
                })
            }
        }
    }
}
