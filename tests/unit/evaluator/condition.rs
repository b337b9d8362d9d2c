//! Unit tests for the condition tree walk

use async_trait::async_trait;
use chrono::{NaiveTime, TimeZone, Utc, Weekday};
use signatrix::evaluator::condition::ConditionWalker;
use signatrix::evaluator::validate::validate_condition;
use signatrix::evaluator::{
    CustomCondition, CustomInput, CustomVerdict, EvaluationError, ValueResolver,
};
use signatrix::models::candle::{Candle, Timeframe};
use signatrix::models::context::{EvaluationContext, MarketWindow};
use signatrix::models::expression::{
    ComparisonOperator, ConditionExpr, LogicalOperator, MathOperator, ValueExpr, VariableScope,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CountingCondition {
    calls: Arc<AtomicUsize>,
    verdict: bool,
}

#[async_trait]
impl CustomCondition for CountingCondition {
    async fn evaluate(&self, _input: CustomInput) -> Result<CustomVerdict, EvaluationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(if self.verdict {
            CustomVerdict::pass(1.0)
        } else {
            CustomVerdict::fail()
        })
    }
}

fn test_context() -> EvaluationContext {
    // A Monday at 12:00 UTC.
    let timestamp = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
    let current = Candle::new(100.0, 101.0, 99.0, 100.5, 1000.0, timestamp);
    EvaluationContext::new("BTC-PERP", Timeframe::M1, MarketWindow::new(current, vec![]))
}

fn custom(name: &str) -> ConditionExpr {
    ConditionExpr::Custom {
        name: name.to_string(),
        params: HashMap::new(),
        sandbox: false,
        timeout_ms: 1_000,
    }
}

fn counting_registry(
    specs: &[(&str, bool)],
) -> (HashMap<String, Arc<dyn CustomCondition>>, Vec<Arc<AtomicUsize>>) {
    let mut registry: HashMap<String, Arc<dyn CustomCondition>> = HashMap::new();
    let mut counters = Vec::new();
    for (name, verdict) in specs {
        let calls = Arc::new(AtomicUsize::new(0));
        counters.push(calls.clone());
        registry.insert(
            name.to_string(),
            Arc::new(CountingCondition {
                calls,
                verdict: *verdict,
            }),
        );
    }
    (registry, counters)
}

#[tokio::test]
async fn test_and_short_circuit_is_lazy() {
    let ctx = test_context();
    let (registry, counters) = counting_registry(&[("first", false), ("second", true)]);
    let walker = ConditionWalker::new(ValueResolver::new(&ctx), &registry);

    let expr = ConditionExpr::Logical {
        operator: LogicalOperator::And,
        conditions: vec![custom("first"), custom("second")],
        short_circuit: true,
    };
    let outcome = walker.evaluate(&expr).await.unwrap();

    assert!(!outcome.success);
    assert!(outcome.short_circuited);
    assert_eq!(counters[0].load(Ordering::SeqCst), 1);
    // The second child's evaluation function was never invoked.
    assert_eq!(counters[1].load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_and_without_short_circuit_evaluates_all() {
    let ctx = test_context();
    let (registry, counters) = counting_registry(&[("first", false), ("second", true)]);
    let walker = ConditionWalker::new(ValueResolver::new(&ctx), &registry);

    let expr = ConditionExpr::Logical {
        operator: LogicalOperator::And,
        conditions: vec![custom("first"), custom("second")],
        short_circuit: false,
    };
    let outcome = walker.evaluate(&expr).await.unwrap();

    assert!(!outcome.success);
    assert!(!outcome.short_circuited);
    assert_eq!(counters[1].load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_or_short_circuits_on_first_true() {
    let ctx = test_context();
    let (registry, counters) = counting_registry(&[("first", true), ("second", false)]);
    let walker = ConditionWalker::new(ValueResolver::new(&ctx), &registry);

    let expr = ConditionExpr::Logical {
        operator: LogicalOperator::Or,
        conditions: vec![custom("first"), custom("second")],
        short_circuit: true,
    };
    let outcome = walker.evaluate(&expr).await.unwrap();

    assert!(outcome.success);
    assert!(outcome.short_circuited);
    assert_eq!(counters[1].load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_not_and_xor() {
    let ctx = test_context();
    let (registry, _) = counting_registry(&[("yes", true), ("no", false)]);
    let walker = ConditionWalker::new(ValueResolver::new(&ctx), &registry);

    let not = ConditionExpr::Logical {
        operator: LogicalOperator::Not,
        conditions: vec![custom("no")],
        short_circuit: true,
    };
    assert!(walker.evaluate(&not).await.unwrap().success);

    let xor_true = ConditionExpr::Logical {
        operator: LogicalOperator::Xor,
        conditions: vec![custom("yes"), custom("no")],
        short_circuit: true,
    };
    assert!(walker.evaluate(&xor_true).await.unwrap().success);

    let xor_false = ConditionExpr::Logical {
        operator: LogicalOperator::Xor,
        conditions: vec![custom("yes"), custom("yes")],
        short_circuit: true,
    };
    assert!(!walker.evaluate(&xor_false).await.unwrap().success);
}

#[test]
fn test_arity_validation() {
    let two_children = ConditionExpr::Logical {
        operator: LogicalOperator::Not,
        conditions: vec![custom("a"), custom("b")],
        short_circuit: true,
    };
    assert!(matches!(
        validate_condition(&two_children),
        Err(EvaluationError::Validation(_))
    ));

    let one_child = ConditionExpr::Logical {
        operator: LogicalOperator::Xor,
        conditions: vec![custom("a")],
        short_circuit: true,
    };
    assert!(validate_condition(&one_child).is_err());
}

#[tokio::test]
async fn test_comparison_tolerance() {
    let ctx = test_context();
    let registry = HashMap::new();
    let walker = ConditionWalker::new(ValueResolver::new(&ctx), &registry);

    let nearly_equal = ConditionExpr::Comparison {
        operator: ComparisonOperator::Equal,
        left: ValueExpr::Literal { value: 1.0 },
        right: ValueExpr::Literal {
            value: 1.0 + 1e-10,
        },
        tolerance: 1e-9,
    };
    assert!(walker.evaluate(&nearly_equal).await.unwrap().success);

    let strict = ConditionExpr::Comparison {
        operator: ComparisonOperator::Equal,
        left: ValueExpr::Literal { value: 1.0 },
        right: ValueExpr::Literal { value: 1.1 },
        tolerance: 1e-9,
    };
    assert!(!walker.evaluate(&strict).await.unwrap().success);

    let greater = ConditionExpr::Comparison {
        operator: ComparisonOperator::GreaterThan,
        left: ValueExpr::Literal { value: 2.0 },
        right: ValueExpr::Literal { value: 1.0 },
        tolerance: 0.0,
    };
    let outcome = walker.evaluate(&greater).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.value, 2.0);
}

#[tokio::test]
async fn test_mathematical_stores_result_variable() {
    let ctx = test_context();
    let registry = HashMap::new();
    let walker = ConditionWalker::new(ValueResolver::new(&ctx), &registry);

    let expr = ConditionExpr::Mathematical {
        operator: MathOperator::Multiply,
        operands: vec![
            ValueExpr::Literal { value: 6.0 },
            ValueExpr::Literal { value: 7.0 },
        ],
        result_variable: Some("answer".to_string()),
    };
    let outcome = walker.evaluate(&expr).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.value, 42.0);
    assert_eq!(ctx.variables.get("answer", VariableScope::Session), 42.0);
}

#[tokio::test]
async fn test_mathematical_division_by_zero_is_reported() {
    let ctx = test_context();
    let registry = HashMap::new();
    let walker = ConditionWalker::new(ValueResolver::new(&ctx), &registry);

    let expr = ConditionExpr::Mathematical {
        operator: MathOperator::Modulo,
        operands: vec![
            ValueExpr::Literal { value: 5.0 },
            ValueExpr::Literal { value: 0.0 },
        ],
        result_variable: None,
    };
    assert!(matches!(
        walker.evaluate(&expr).await,
        Err(EvaluationError::DivisionByZero)
    ));
}

#[tokio::test]
async fn test_time_window_gates_lazily() {
    let ctx = test_context();
    let (registry, counters) = counting_registry(&[("inner", true)]);
    let walker = ConditionWalker::new(ValueResolver::new(&ctx), &registry);

    // Context timestamp is Monday 12:00 UTC; this window misses it.
    let outside = ConditionExpr::TimeWindow {
        start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
        days_of_week: vec![],
        utc_offset_minutes: 0,
        condition: Box::new(custom("inner")),
    };
    let outcome = walker.evaluate(&outside).await.unwrap();
    assert!(!outcome.success);
    // The nested condition was never touched.
    assert_eq!(counters[0].load(Ordering::SeqCst), 0);

    let inside = ConditionExpr::TimeWindow {
        start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        days_of_week: vec![Weekday::Mon, Weekday::Tue],
        utc_offset_minutes: 0,
        condition: Box::new(custom("inner")),
    };
    let outcome = walker.evaluate(&inside).await.unwrap();
    assert!(outcome.success);
    assert_eq!(counters[0].load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_time_window_respects_utc_offset() {
    let ctx = test_context();
    let registry = HashMap::new();
    let walker = ConditionWalker::new(ValueResolver::new(&ctx), &registry);

    // 12:00 UTC is 14:00 at +120 minutes; a 13:00-15:00 local window hits.
    let expr = ConditionExpr::TimeWindow {
        start_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
        days_of_week: vec![],
        utc_offset_minutes: 120,
        condition: Box::new(ConditionExpr::Comparison {
            operator: ComparisonOperator::GreaterThan,
            left: ValueExpr::Literal { value: 1.0 },
            right: ValueExpr::Literal { value: 0.0 },
            tolerance: 0.0,
        }),
    };
    assert!(walker.evaluate(&expr).await.unwrap().success);
}

#[tokio::test]
async fn test_unknown_custom_condition() {
    let ctx = test_context();
    let registry = HashMap::new();
    let walker = ConditionWalker::new(ValueResolver::new(&ctx), &registry);

    let outcome = walker.evaluate(&custom("ghost")).await;
    assert!(matches!(
        outcome,
        Err(EvaluationError::UnknownCustomCondition(_))
    ));
}
