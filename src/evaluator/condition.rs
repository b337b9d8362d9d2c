//! The recursive condition-tree walk.

use crate::evaluator::crossover;
use crate::evaluator::custom::{CustomCondition, CustomInput};
use crate::evaluator::error::EvaluationError;
use crate::evaluator::pattern;
use crate::evaluator::value::ValueResolver;
use crate::models::expression::{
    ComparisonOperator, ConditionExpr, CrossoverKind, LogicalOperator, MathOperator, PatternKind,
    ValueExpr,
};
use chrono::{Datelike, FixedOffset, NaiveTime, Timelike, Weekday};
use futures_util::future::BoxFuture;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// What one condition node resolved to.
#[derive(Debug, Clone)]
pub struct ConditionOutcome {
    pub success: bool,
    pub value: f64,
    pub confidence: f64,
    pub operator: Option<String>,
    pub intermediate: Vec<serde_json::Value>,
    pub short_circuited: bool,
}

impl ConditionOutcome {
    fn boolean(success: bool, operator: &str) -> Self {
        Self {
            success,
            value: if success { 1.0 } else { 0.0 },
            confidence: if success { 1.0 } else { 0.0 },
            operator: Some(operator.to_string()),
            intermediate: Vec::new(),
            short_circuited: false,
        }
    }
}

/// Walks a condition tree against one context. Borrows a snapshot of the
/// engine's custom-condition registry for the duration of the walk.
pub struct ConditionWalker<'a> {
    resolver: ValueResolver<'a>,
    customs: &'a HashMap<String, Arc<dyn CustomCondition>>,
}

impl<'a> ConditionWalker<'a> {
    pub fn new(
        resolver: ValueResolver<'a>,
        customs: &'a HashMap<String, Arc<dyn CustomCondition>>,
    ) -> Self {
        Self { resolver, customs }
    }

    pub fn evaluate<'s>(
        &'s self,
        expr: &'s ConditionExpr,
    ) -> BoxFuture<'s, Result<ConditionOutcome, EvaluationError>> {
        Box::pin(async move {
            match expr {
                ConditionExpr::Logical {
                    operator,
                    conditions,
                    short_circuit,
                } => self.eval_logical(*operator, conditions, *short_circuit).await,
                ConditionExpr::Comparison {
                    operator,
                    left,
                    right,
                    tolerance,
                } => self.eval_comparison(*operator, left, right, *tolerance),
                ConditionExpr::Mathematical {
                    operator,
                    operands,
                    result_variable,
                } => self.eval_mathematical(*operator, operands, result_variable.as_deref()),
                ConditionExpr::Crossover {
                    kind,
                    source,
                    reference,
                    confirmation_periods,
                    minimum_threshold,
                    ..
                } => self.eval_crossover(
                    *kind,
                    source,
                    reference,
                    *confirmation_periods,
                    *minimum_threshold,
                ),
                ConditionExpr::Pattern {
                    kind,
                    source,
                    lookback_periods,
                    confidence,
                    params,
                } => self.eval_pattern(*kind, source, *lookback_periods, *confidence, params),
                ConditionExpr::TimeWindow {
                    start_time,
                    end_time,
                    days_of_week,
                    utc_offset_minutes,
                    condition,
                } => {
                    self.eval_time_window(
                        *start_time,
                        *end_time,
                        days_of_week,
                        *utc_offset_minutes,
                        condition,
                    )
                    .await
                }
                ConditionExpr::Custom {
                    name,
                    params,
                    sandbox,
                    timeout_ms,
                } => self.eval_custom(name, params, *sandbox, *timeout_ms).await,
            }
        })
    }

    async fn eval_logical(
        &self,
        operator: LogicalOperator,
        conditions: &[ConditionExpr],
        short_circuit: bool,
    ) -> Result<ConditionOutcome, EvaluationError> {
        let name = match operator {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
            LogicalOperator::Not => "NOT",
            LogicalOperator::Xor => "XOR",
        };

        match operator {
            LogicalOperator::Not => {
                let only = conditions
                    .first()
                    .ok_or_else(|| EvaluationError::validation("NOT takes exactly one condition"))?;
                let child = self.evaluate(only).await?;
                let mut outcome = ConditionOutcome::boolean(!child.success, name);
                outcome.confidence = child.confidence;
                outcome.intermediate = vec![json!({"child": 0, "success": child.success})];
                Ok(outcome)
            }
            LogicalOperator::Xor => {
                let [a, b] = conditions else {
                    return Err(EvaluationError::validation(
                        "XOR takes exactly two conditions",
                    ));
                };
                let first = self.evaluate(a).await?;
                let second = self.evaluate(b).await?;
                let success = first.success != second.success;
                let mut outcome = ConditionOutcome::boolean(success, name);
                outcome.confidence = first.confidence.min(second.confidence);
                outcome.intermediate = vec![
                    json!({"child": 0, "success": first.success}),
                    json!({"child": 1, "success": second.success}),
                ];
                Ok(outcome)
            }
            LogicalOperator::And | LogicalOperator::Or => {
                let is_and = operator == LogicalOperator::And;
                let mut intermediate = Vec::with_capacity(conditions.len());
                let mut confidence: Option<f64> = None;
                let mut success = is_and;
                let mut short_circuited = false;

                for (index, child_expr) in conditions.iter().enumerate() {
                    let child = self.evaluate(child_expr).await?;
                    intermediate.push(json!({
                        "child": index,
                        "success": child.success,
                        "value": child.value,
                    }));
                    confidence = Some(match confidence {
                        None => child.confidence,
                        Some(acc) if is_and => acc.min(child.confidence),
                        Some(acc) => acc.max(child.confidence),
                    });
                    let decided = if is_and { !child.success } else { child.success };
                    if decided {
                        success = !is_and;
                        if short_circuit {
                            // Remaining children stay untouched.
                            short_circuited = index + 1 < conditions.len();
                            break;
                        }
                    }
                }

                let mut outcome = ConditionOutcome::boolean(success, name);
                outcome.confidence = confidence.unwrap_or(0.0);
                outcome.intermediate = intermediate;
                outcome.short_circuited = short_circuited;
                Ok(outcome)
            }
        }
    }

    fn eval_comparison(
        &self,
        operator: ComparisonOperator,
        left: &ValueExpr,
        right: &ValueExpr,
        tolerance: f64,
    ) -> Result<ConditionOutcome, EvaluationError> {
        let left_value = self.resolver.resolve(left)?;
        let right_value = self.resolver.resolve(right)?;

        let success = match operator {
            ComparisonOperator::GreaterThan => left_value > right_value,
            ComparisonOperator::GreaterEqual => left_value >= right_value,
            ComparisonOperator::LessThan => left_value < right_value,
            ComparisonOperator::LessEqual => left_value <= right_value,
            // Absolute tolerance absorbs floating-point noise on equality.
            ComparisonOperator::Equal => (left_value - right_value).abs() <= tolerance,
            ComparisonOperator::NotEqual => (left_value - right_value).abs() > tolerance,
        };

        let mut outcome = ConditionOutcome::boolean(success, &format!("{operator:?}"));
        outcome.value = left_value;
        outcome.intermediate = vec![json!(left_value), json!(right_value)];
        Ok(outcome)
    }

    fn eval_mathematical(
        &self,
        operator: MathOperator,
        operands: &[ValueExpr],
        result_variable: Option<&str>,
    ) -> Result<ConditionOutcome, EvaluationError> {
        let value = self.resolver.fold(operator, operands, 0)?;
        if let Some(name) = result_variable {
            self.resolver.context().variables.set_session(name, value);
        }
        let success = value.is_finite() && value != 0.0;
        let mut outcome = ConditionOutcome::boolean(success, &format!("{operator:?}"));
        outcome.value = value;
        Ok(outcome)
    }

    fn eval_crossover(
        &self,
        kind: CrossoverKind,
        source: &ValueExpr,
        reference: &ValueExpr,
        confirmation_periods: usize,
        minimum_threshold: Option<f64>,
    ) -> Result<ConditionOutcome, EvaluationError> {
        let result = crossover::evaluate(
            &self.resolver,
            kind,
            source,
            reference,
            confirmation_periods,
            minimum_threshold,
        )?;
        let mut outcome = ConditionOutcome::boolean(result.fired, &format!("{kind:?}"));
        outcome.value = result.difference;
        outcome.intermediate = result.diffs.iter().map(|d| json!(d)).collect();
        Ok(outcome)
    }

    fn eval_pattern(
        &self,
        kind: PatternKind,
        source: &ValueExpr,
        lookback_periods: usize,
        threshold: f64,
        params: &HashMap<String, serde_json::Value>,
    ) -> Result<ConditionOutcome, EvaluationError> {
        let confidence =
            pattern::evaluate(&self.resolver, kind, source, lookback_periods, params)?;
        let success = confidence >= threshold;
        let mut outcome = ConditionOutcome::boolean(success, &format!("{kind:?}"));
        outcome.value = confidence;
        outcome.confidence = confidence;
        Ok(outcome)
    }

    async fn eval_time_window(
        &self,
        start_time: NaiveTime,
        end_time: NaiveTime,
        days_of_week: &[Weekday],
        utc_offset_minutes: i32,
        condition: &ConditionExpr,
    ) -> Result<ConditionOutcome, EvaluationError> {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
            EvaluationError::validation("time window UTC offset out of range")
        })?;
        let local = self.resolver.context().timestamp.with_timezone(&offset);

        let day_ok = days_of_week.is_empty() || days_of_week.contains(&local.weekday());
        let time = local.time();
        let time_ok = if start_time <= end_time {
            time >= start_time && time <= end_time
        } else {
            // Window wraps midnight.
            time >= start_time || time <= end_time
        };

        if !(day_ok && time_ok) {
            // Outside the window the nested condition is never touched.
            let mut outcome = ConditionOutcome::boolean(false, "TimeWindow");
            outcome.intermediate = vec![json!({
                "gated": true,
                "local_time": format!("{:02}:{:02}", time.hour(), time.minute()),
            })];
            return Ok(outcome);
        }

        let mut inner = self.evaluate(condition).await?;
        inner.operator = Some("TimeWindow".to_string());
        Ok(inner)
    }

    async fn eval_custom(
        &self,
        name: &str,
        params: &HashMap<String, serde_json::Value>,
        sandbox: bool,
        timeout_ms: u64,
    ) -> Result<ConditionOutcome, EvaluationError> {
        let handler = self
            .customs
            .get(name)
            .cloned()
            .ok_or_else(|| EvaluationError::UnknownCustomCondition(name.to_string()))?;

        let ctx = self.resolver.context();
        let input = CustomInput {
            params: params.clone(),
            symbol: ctx.symbol.clone(),
            timeframe: ctx.timeframe,
            timestamp: ctx.timestamp,
            current: ctx.market.current.clone(),
        };

        let budget = Duration::from_millis(timeout_ms);
        let verdict = if sandbox {
            // Spawned task is the isolation boundary; a panic inside the
            // handler surfaces as a join error, not a walk panic.
            let handle = tokio::spawn(async move { handler.evaluate(input).await });
            match tokio::time::timeout(budget, handle).await {
                Err(_) => return Err(EvaluationError::Timeout(timeout_ms)),
                Ok(Err(join_error)) => {
                    return Err(EvaluationError::CustomFailure(join_error.to_string()))
                }
                Ok(Ok(result)) => result?,
            }
        } else {
            match tokio::time::timeout(budget, handler.evaluate(input)).await {
                Err(_) => return Err(EvaluationError::Timeout(timeout_ms)),
                Ok(result) => result?,
            }
        };

        let mut outcome = ConditionOutcome::boolean(verdict.success, "Custom");
        outcome.value = verdict.value;
        outcome.confidence = verdict.confidence;
        Ok(outcome)
    }
}
