//! The condition evaluation engine: validation, caching, timeouts, and
//! priority-ordered batch dispatch under a concurrency bound.

use crate::config::EngineConfig;
use crate::evaluator::condition::{ConditionOutcome, ConditionWalker};
use crate::evaluator::custom::CustomCondition;
use crate::evaluator::error::EvaluationError;
use crate::evaluator::validate;
use crate::evaluator::value::{ComputedCache, ValueResolver};
use crate::models::context::EvaluationContext;
use crate::models::evaluation::{
    BatchEvaluationResult, ConditionEvaluationResult, EvaluationDetails, EvaluationScope,
};
use crate::models::expression::ConditionDefinition;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct CachedEvaluation {
    result: ConditionEvaluationResult,
    expires_at: DateTime<Utc>,
}

/// Cooperative cancellation for a batch: not-yet-started conditions are
/// skipped, in-flight ones finish under their own timeout.
#[derive(Debug, Clone, Default)]
pub struct BatchControl {
    cancelled: Arc<AtomicBool>,
}

impl BatchControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Evaluates condition definitions against contexts.
///
/// Constructed explicitly and passed by reference; there is no process-wide
/// instance. The custom-condition registry, the per-condition result cache
/// and the computed-value cache all live on the instance.
pub struct ConditionEvaluator {
    config: EngineConfig,
    customs: RwLock<HashMap<String, Arc<dyn CustomCondition>>>,
    result_cache: tokio::sync::RwLock<HashMap<String, CachedEvaluation>>,
    computed_cache: ComputedCache,
    semaphore: Semaphore,
}

impl ConditionEvaluator {
    pub fn new(config: EngineConfig) -> Self {
        let semaphore = Semaphore::new(config.max_concurrency.max(1));
        let computed_cache = ComputedCache::new(config.cache_ttl_ms);
        Self {
            config,
            customs: RwLock::new(HashMap::new()),
            result_cache: tokio::sync::RwLock::new(HashMap::new()),
            computed_cache,
            semaphore,
        }
    }

    /// Register a named custom-condition handler.
    pub fn register_custom(&self, name: &str, handler: Arc<dyn CustomCondition>) {
        if let Ok(mut customs) = self.customs.write() {
            customs.insert(name.to_string(), handler);
        }
    }

    /// Drop every cached condition result and computed value.
    pub async fn invalidate_cache(&self) {
        self.result_cache.write().await.clear();
        self.computed_cache.invalidate();
        debug!("evaluator caches invalidated");
    }

    pub async fn cached_results(&self) -> usize {
        self.result_cache.read().await.len()
    }

    /// Evaluate one condition definition against a context.
    ///
    /// Never returns an error: validation failures, runtime failures and
    /// timeouts are all captured into the result's `error` field.
    pub async fn evaluate(
        &self,
        definition: &ConditionDefinition,
        ctx: &EvaluationContext,
    ) -> ConditionEvaluationResult {
        let started = Instant::now();

        if let Err(error) = validate::validate_condition(&definition.expression) {
            return self.error_result(definition, ctx, error, started);
        }

        let cache_key = Self::cache_key(definition, ctx);
        if self.config.cache_enabled {
            if let Some(hit) = self.cache_lookup(&cache_key).await {
                debug!(condition_id = %definition.id, "condition cache hit");
                let mut result = hit;
                result.details.from_cache = true;
                result.execution_time_ms = started.elapsed().as_millis() as u64;
                return result;
            }
        }

        let customs = self
            .customs
            .read()
            .map(|map| map.clone())
            .unwrap_or_default();
        let resolver = ValueResolver::with_computed_cache(ctx, &self.computed_cache);
        let walker = ConditionWalker::new(resolver, &customs);

        let budget = std::time::Duration::from_millis(self.config.default_timeout_ms)
            .min(ctx.remaining_budget());
        let budget_ms = budget.as_millis() as u64;

        let result = match tokio::time::timeout(budget, walker.evaluate(&definition.expression))
            .await
        {
            Err(_) => {
                warn!(condition_id = %definition.id, budget_ms, "condition evaluation timed out");
                self.error_result(definition, ctx, EvaluationError::Timeout(budget_ms), started)
            }
            Ok(Err(error)) => {
                debug!(condition_id = %definition.id, error = %error, "condition evaluation failed");
                self.error_result(definition, ctx, error, started)
            }
            Ok(Ok(outcome)) => self.outcome_result(definition, ctx, outcome, started),
        };

        if self.config.cache_enabled && result.error.is_none() {
            self.cache_store(cache_key, &result).await;
        }
        result
    }

    /// Evaluate a set of conditions against one shared context, highest
    /// priority first, bounded by `max_concurrency`.
    pub async fn evaluate_batch(
        &self,
        definitions: &[ConditionDefinition],
        ctx: &EvaluationContext,
    ) -> BatchEvaluationResult {
        self.evaluate_batch_with_control(definitions, ctx, &BatchControl::new())
            .await
    }

    pub async fn evaluate_batch_with_control(
        &self,
        definitions: &[ConditionDefinition],
        ctx: &EvaluationContext,
        control: &BatchControl,
    ) -> BatchEvaluationResult {
        let mut ordered: Vec<&ConditionDefinition> = definitions.iter().collect();
        ordered.sort_by_key(|d| d.priority);

        let futures = ordered.into_iter().map(|definition| async move {
            if control.is_cancelled() {
                return None;
            }
            let _permit = self.semaphore.acquire().await.ok()?;
            if control.is_cancelled() {
                return None;
            }
            Some(self.evaluate(definition, ctx).await)
        });

        let outcomes = join_all(futures).await;
        let cancelled = outcomes.iter().filter(|o| o.is_none()).count();
        let results: Vec<ConditionEvaluationResult> = outcomes.into_iter().flatten().collect();

        let batch = BatchEvaluationResult::from_results(results, cancelled);
        info!(
            conditions = definitions.len(),
            successes = batch.successes,
            failures = batch.failures,
            cache_hits = batch.cache_hits,
            short_circuits = batch.short_circuits,
            cancelled = batch.cancelled,
            average_latency_ms = batch.average_latency_ms,
            "batch evaluation complete"
        );
        batch
    }

    fn cache_key(definition: &ConditionDefinition, ctx: &EvaluationContext) -> String {
        format!(
            "{}:{}:{}:{}",
            definition.id,
            ctx.symbol,
            ctx.timeframe,
            ctx.timestamp.timestamp_millis()
        )
    }

    async fn cache_lookup(&self, key: &str) -> Option<ConditionEvaluationResult> {
        let cache = self.result_cache.read().await;
        let entry = cache.get(key)?;
        if Utc::now() < entry.expires_at {
            Some(entry.result.clone())
        } else {
            None
        }
    }

    async fn cache_store(&self, key: String, result: &ConditionEvaluationResult) {
        let mut cache = self.result_cache.write().await;
        // Expired entries piggyback on writes instead of a sweeper task.
        let now = Utc::now();
        cache.retain(|_, entry| entry.expires_at > now);
        cache.insert(
            key,
            CachedEvaluation {
                result: result.clone(),
                expires_at: now + ChronoDuration::milliseconds(self.config.cache_ttl_ms),
            },
        );
    }

    fn scope(ctx: &EvaluationContext) -> EvaluationScope {
        EvaluationScope {
            timestamp: ctx.timestamp,
            symbol: ctx.symbol.clone(),
            timeframe: ctx.timeframe,
        }
    }

    fn error_result(
        &self,
        definition: &ConditionDefinition,
        ctx: &EvaluationContext,
        error: EvaluationError,
        started: Instant,
    ) -> ConditionEvaluationResult {
        ConditionEvaluationResult {
            condition_id: definition.id.clone(),
            success: false,
            value: 0.0,
            confidence: 0.0,
            execution_time_ms: started.elapsed().as_millis() as u64,
            error: Some(error.to_string()),
            details: EvaluationDetails::default(),
            context: Self::scope(ctx),
        }
    }

    fn outcome_result(
        &self,
        definition: &ConditionDefinition,
        ctx: &EvaluationContext,
        outcome: ConditionOutcome,
        started: Instant,
    ) -> ConditionEvaluationResult {
        ConditionEvaluationResult {
            condition_id: definition.id.clone(),
            success: outcome.success,
            value: outcome.value,
            confidence: outcome.confidence,
            execution_time_ms: started.elapsed().as_millis() as u64,
            error: None,
            details: EvaluationDetails {
                operator: outcome.operator,
                intermediate: outcome.intermediate,
                short_circuited: outcome.short_circuited,
                from_cache: false,
            },
            context: Self::scope(ctx),
        }
    }
}
