//! Pipeline adapter between the indicator engine and the evaluator.
//!
//! Holds a TTL-bounded result cache per indicator id with a hard size cap
//! (least-recently-updated eviction), throttles the real-time update path,
//! and assembles evaluation contexts from fresh entries.

use crate::config::PipelineConfig;
use crate::models::candle::Timeframe;
use crate::models::context::{EvaluationContext, IndicatorSeries, MarketWindow};
use crate::models::indicators::{IndicatorResult, IndicatorValue};
use crate::pipeline::events::PipelineEvent;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct CachedSeries {
    results: VecDeque<IndicatorResult<IndicatorValue>>,
    last_applied: DateTime<Utc>,
    cached_at: DateTime<Utc>,
}

/// Partition of a requested indicator-id list. Callers must handle all
/// three buckets before constructing an evaluation context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyReport {
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
    pub disabled: Vec<String>,
}

/// Cache/health introspection snapshot.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: usize,
    pub hit_rate: f64,
    pub last_update: Option<DateTime<Utc>>,
    pub evictions: u64,
    pub throttled: u64,
}

/// The adapter instance. Shared mutable state sits behind async locks; the
/// write path is effectively single-writer since candle updates arrive in
/// order from one subscription.
pub struct IndicatorPipeline {
    config: PipelineConfig,
    registrations: RwLock<HashMap<String, bool>>,
    cache: RwLock<HashMap<String, CachedSeries>>,
    subscribers: Mutex<Vec<mpsc::Sender<PipelineEvent>>>,
    lookups: AtomicU64,
    hits: AtomicU64,
    evictions: AtomicU64,
    throttled: AtomicU64,
}

impl IndicatorPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            registrations: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
        }
    }

    /// Register an indicator id with the adapter.
    pub async fn register_indicator(&self, indicator_id: &str, enabled: bool) {
        self.registrations
            .write()
            .await
            .insert(indicator_id.to_string(), enabled);
    }

    /// Enable or disable a registered id. Returns false for unknown ids.
    pub async fn set_enabled(&self, indicator_id: &str, enabled: bool) -> bool {
        match self.registrations.write().await.get_mut(indicator_id) {
            Some(flag) => {
                *flag = enabled;
                true
            }
            None => false,
        }
    }

    /// Subscribe to pipeline events over a bounded channel.
    pub async fn subscribe(&self) -> mpsc::Receiver<PipelineEvent> {
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        self.subscribers.lock().await.push(tx);
        rx
    }

    /// Apply one indicator update.
    ///
    /// Updates landing within `update_throttle_ms` of the last applied
    /// update for the same id are dropped to bound the processing rate.
    /// Returns whether the update was applied.
    pub async fn apply_update(
        &self,
        indicator_id: &str,
        result: IndicatorResult<IndicatorValue>,
    ) -> bool {
        match self.registrations.read().await.get(indicator_id) {
            Some(true) => {}
            Some(false) => {
                debug!(indicator_id, "update for disabled indicator dropped");
                return false;
            }
            None => {
                warn!(indicator_id, "update for unregistered indicator dropped");
                return false;
            }
        }

        let now = Utc::now();
        let mut evicted: Vec<String> = Vec::new();
        {
            let mut cache = self.cache.write().await;

            if let Some(entry) = cache.get(indicator_id) {
                let elapsed = now.signed_duration_since(entry.last_applied);
                if elapsed < Duration::milliseconds(self.config.update_throttle_ms) {
                    self.throttled.fetch_add(1, Ordering::Relaxed);
                    debug!(indicator_id, "update throttled");
                    return false;
                }
            }

            let ttl = Duration::milliseconds(self.config.cache_ttl_ms);
            cache.retain(|_, entry| now.signed_duration_since(entry.cached_at) < ttl);

            let entry = cache.entry(indicator_id.to_string()).or_insert(CachedSeries {
                results: VecDeque::with_capacity(self.config.history_window),
                last_applied: now,
                cached_at: now,
            });
            if entry.results.len() == self.config.history_window {
                entry.results.pop_front();
            }
            entry.results.push_back(result);
            entry.last_applied = now;
            entry.cached_at = now;

            // Least-recently-updated eviction on overflow.
            if cache.len() > self.config.max_cache_size {
                let excess = cache.len() - self.config.max_cache_size;
                let mut by_age: Vec<(String, DateTime<Utc>)> = cache
                    .iter()
                    .map(|(id, entry)| (id.clone(), entry.last_applied))
                    .collect();
                by_age.sort_by_key(|(_, applied)| *applied);
                for (id, _) in by_age.into_iter().take(excess) {
                    cache.remove(&id);
                    evicted.push(id);
                }
                self.evictions.fetch_add(evicted.len() as u64, Ordering::Relaxed);
            }
        }

        for id in evicted {
            debug!(indicator_id = %id, "cache entry evicted");
            self.emit(PipelineEvent::CacheInvalidated {
                indicator_id: Some(id),
            })
            .await;
        }
        self.emit(PipelineEvent::IndicatorUpdated {
            indicator_id: indicator_id.to_string(),
            timestamp: now,
        })
        .await;
        true
    }

    /// Fresh (non-expired) result series for an id, if cached.
    pub async fn snapshot(&self, indicator_id: &str) -> Option<IndicatorSeries> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let cache = self.cache.read().await;
        let entry = cache.get(indicator_id)?;
        let age = Utc::now().signed_duration_since(entry.cached_at);
        if age >= Duration::milliseconds(self.config.cache_ttl_ms) {
            return None;
        }
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(IndicatorSeries::from_results(entry.results.clone()))
    }

    /// Partition requested ids into valid / invalid (unknown) / disabled.
    pub async fn validate_indicator_dependencies(&self, ids: &[String]) -> DependencyReport {
        let registrations = self.registrations.read().await;
        let mut report = DependencyReport::default();
        for id in ids {
            match registrations.get(id) {
                Some(true) => report.valid.push(id.clone()),
                Some(false) => report.disabled.push(id.clone()),
                None => report.invalid.push(id.clone()),
            }
        }
        report
    }

    /// Assemble an evaluation context from the market window plus the fresh
    /// cached series of the requested ids. Validate dependencies first;
    /// unknown, disabled or expired ids are simply absent from the context.
    pub async fn build_context(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        market: MarketWindow,
        indicator_ids: &[String],
    ) -> EvaluationContext {
        let mut ctx = EvaluationContext::new(symbol, timeframe, market);
        for id in indicator_ids {
            if let Some(series) = self.snapshot(id).await {
                ctx = ctx.with_indicator(id, series);
            }
        }
        ctx
    }

    /// Drop one entry, or the whole cache when `indicator_id` is `None`.
    pub async fn invalidate(&self, indicator_id: Option<&str>) {
        {
            let mut cache = self.cache.write().await;
            match indicator_id {
                Some(id) => {
                    cache.remove(id);
                }
                None => cache.clear(),
            }
        }
        self.emit(PipelineEvent::CacheInvalidated {
            indicator_id: indicator_id.map(|s| s.to_string()),
        })
        .await;
    }

    pub async fn stats(&self) -> CacheStats {
        let cache = self.cache.read().await;
        let lookups = self.lookups.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        CacheStats {
            entries: cache.len(),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            last_update: cache.values().map(|entry| entry.last_applied).max(),
            evictions: self.evictions.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
        }
    }

    async fn emit(&self, event: PipelineEvent) {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|tx| !tx.is_closed());
        for tx in subscribers.iter() {
            if tx.try_send(event.clone()).is_err() {
                warn!("pipeline event dropped: subscriber channel full");
            }
        }
    }
}
