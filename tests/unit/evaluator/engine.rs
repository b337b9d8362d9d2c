//! Unit tests for the condition evaluation engine

use async_trait::async_trait;
use chrono::Utc;
use signatrix::config::EngineConfig;
use signatrix::evaluator::engine::BatchControl;
use signatrix::evaluator::{
    ConditionEvaluator, CustomCondition, CustomInput, CustomVerdict, EvaluationError,
};
use signatrix::models::candle::{Candle, Timeframe};
use signatrix::models::context::{EvaluationContext, MarketWindow};
use signatrix::models::expression::{
    ComparisonOperator, ConditionDefinition, ConditionExpr, LogicalOperator, Priority, ValueExpr,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct SlowCondition {
    delay_ms: u64,
}

#[async_trait]
impl CustomCondition for SlowCondition {
    async fn evaluate(&self, _input: CustomInput) -> Result<CustomVerdict, EvaluationError> {
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        Ok(CustomVerdict::pass(1.0))
    }
}

struct CountingCondition {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl CustomCondition for CountingCondition {
    async fn evaluate(&self, _input: CustomInput) -> Result<CustomVerdict, EvaluationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CustomVerdict::pass(1.0))
    }
}

fn test_context() -> EvaluationContext {
    let current = Candle::new(100.0, 101.0, 99.0, 100.5, 1000.0, Utc::now());
    EvaluationContext::new("BTC-PERP", Timeframe::M1, MarketWindow::new(current, vec![]))
}

fn always_true(id: &str) -> ConditionDefinition {
    ConditionDefinition::new(
        id,
        ConditionExpr::Comparison {
            operator: ComparisonOperator::GreaterThan,
            left: ValueExpr::Literal { value: 1.0 },
            right: ValueExpr::Literal { value: 0.0 },
            tolerance: 0.0,
        },
    )
}

#[tokio::test]
async fn test_cache_idempotence() {
    let evaluator = ConditionEvaluator::new(EngineConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));
    evaluator.register_custom(
        "counted",
        Arc::new(CountingCondition {
            calls: calls.clone(),
        }),
    );

    let definition = ConditionDefinition::new(
        "cached-cond",
        ConditionExpr::Custom {
            name: "counted".to_string(),
            params: HashMap::new(),
            sandbox: false,
            timeout_ms: 1_000,
        },
    );
    let ctx = test_context();

    let first = evaluator.evaluate(&definition, &ctx).await;
    assert!(first.success);
    assert!(!first.details.from_cache);

    // Same condition id, same context window, within the TTL: served from
    // cache with zero additional evaluations.
    let second = evaluator.evaluate(&definition, &ctx).await;
    assert!(second.success);
    assert!(second.details.from_cache);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cache_disabled_reevaluates() {
    let config = EngineConfig {
        cache_enabled: false,
        ..EngineConfig::default()
    };
    let evaluator = ConditionEvaluator::new(config);
    let calls = Arc::new(AtomicUsize::new(0));
    evaluator.register_custom(
        "counted",
        Arc::new(CountingCondition {
            calls: calls.clone(),
        }),
    );

    let definition = ConditionDefinition::new(
        "uncached",
        ConditionExpr::Custom {
            name: "counted".to_string(),
            params: HashMap::new(),
            sandbox: false,
            timeout_ms: 1_000,
        },
    );
    let ctx = test_context();
    evaluator.evaluate(&definition, &ctx).await;
    evaluator.evaluate(&definition, &ctx).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_custom_timeout_is_reported_distinctly() {
    let evaluator = ConditionEvaluator::new(EngineConfig::default());
    evaluator.register_custom("slow", Arc::new(SlowCondition { delay_ms: 500 }));

    let definition = ConditionDefinition::new(
        "too-slow",
        ConditionExpr::Custom {
            name: "slow".to_string(),
            params: HashMap::new(),
            sandbox: false,
            timeout_ms: 20,
        },
    );
    let ctx = test_context();
    let result = evaluator.evaluate(&definition, &ctx).await;

    assert!(!result.success);
    assert!(result.is_timeout(), "error was: {:?}", result.error);
}

#[tokio::test]
async fn test_validation_error_blocks_only_that_condition() {
    let evaluator = ConditionEvaluator::new(EngineConfig::default());
    let ctx = test_context();

    let malformed = ConditionDefinition::new(
        "bad-not",
        ConditionExpr::Logical {
            operator: LogicalOperator::Not,
            conditions: vec![],
            short_circuit: true,
        },
    );
    let definitions = vec![malformed, always_true("fine")];
    let batch = evaluator.evaluate_batch(&definitions, &ctx).await;

    assert_eq!(batch.results.len(), 2);
    assert_eq!(batch.successes, 1);
    assert_eq!(batch.failures, 1);
    let bad = batch
        .results
        .iter()
        .find(|r| r.condition_id == "bad-not")
        .unwrap();
    assert!(bad.error.as_deref().unwrap().contains("validation"));
}

#[tokio::test]
async fn test_batch_counters_and_latency() {
    let evaluator = ConditionEvaluator::new(EngineConfig::default());
    let ctx = test_context();

    let definitions = vec![
        always_true("a"),
        always_true("b"),
        ConditionDefinition::new(
            "fails",
            ConditionExpr::Comparison {
                operator: ComparisonOperator::LessThan,
                left: ValueExpr::Literal { value: 1.0 },
                right: ValueExpr::Literal { value: 0.0 },
                tolerance: 0.0,
            },
        ),
    ];
    let batch = evaluator.evaluate_batch(&definitions, &ctx).await;

    assert_eq!(batch.successes, 2);
    assert_eq!(batch.failures, 1);
    assert_eq!(batch.cancelled, 0);
    assert!(batch.average_latency_ms >= 0.0);
    assert!(batch.max_latency_ms < 5_000);
}

#[tokio::test]
async fn test_batch_priority_order() {
    let evaluator = ConditionEvaluator::new(EngineConfig {
        max_concurrency: 1,
        ..EngineConfig::default()
    });
    let ctx = test_context();

    let definitions = vec![
        always_true("low").with_priority(Priority::Low),
        always_true("urgent").with_priority(Priority::Urgent),
        always_true("medium").with_priority(Priority::Medium),
    ];
    let batch = evaluator.evaluate_batch(&definitions, &ctx).await;
    let order: Vec<&str> = batch
        .results
        .iter()
        .map(|r| r.condition_id.as_str())
        .collect();
    assert_eq!(order, vec!["urgent", "medium", "low"]);
}

#[tokio::test]
async fn test_cancelled_batch_skips_pending() {
    let evaluator = ConditionEvaluator::new(EngineConfig::default());
    let ctx = test_context();
    let control = BatchControl::new();
    control.cancel();

    let definitions = vec![always_true("a"), always_true("b")];
    let batch = evaluator
        .evaluate_batch_with_control(&definitions, &ctx, &control)
        .await;

    assert_eq!(batch.results.len(), 0);
    assert_eq!(batch.cancelled, 2);
}

#[tokio::test]
async fn test_sandboxed_custom_runs_and_times_out() {
    let evaluator = ConditionEvaluator::new(EngineConfig::default());
    evaluator.register_custom("slow", Arc::new(SlowCondition { delay_ms: 5 }));

    let quick = ConditionDefinition::new(
        "sandboxed",
        ConditionExpr::Custom {
            name: "slow".to_string(),
            params: HashMap::new(),
            sandbox: true,
            timeout_ms: 1_000,
        },
    );
    let ctx = test_context();
    let result = evaluator.evaluate(&quick, &ctx).await;
    assert!(result.success);

    evaluator.invalidate_cache().await;
    evaluator.register_custom("slow", Arc::new(SlowCondition { delay_ms: 500 }));
    let stuck = ConditionDefinition::new(
        "sandboxed",
        ConditionExpr::Custom {
            name: "slow".to_string(),
            params: HashMap::new(),
            sandbox: true,
            timeout_ms: 20,
        },
    );
    let result = evaluator.evaluate(&stuck, &ctx).await;
    assert!(result.is_timeout());
}
