//! Evaluation context: the read-shared snapshot a condition tree walks over.

use crate::models::candle::{Candle, Timeframe};
use crate::models::expression::{MarketField, VariableScope};
use crate::models::indicators::{IndicatorResult, IndicatorValue};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Current candle plus a bounded window of prior candles (oldest first,
/// not including the current one).
#[derive(Debug, Clone)]
pub struct MarketWindow {
    pub current: Candle,
    pub history: Vec<Candle>,
}

impl MarketWindow {
    pub fn new(current: Candle, history: Vec<Candle>) -> Self {
        Self { current, history }
    }

    /// Candle `offset` samples back; 0 is the current candle.
    pub fn candle_at(&self, offset: usize) -> Option<&Candle> {
        if offset == 0 {
            Some(&self.current)
        } else {
            let len = self.history.len();
            if offset > len {
                None
            } else {
                self.history.get(len - offset)
            }
        }
    }

    pub fn field_at(&self, field: MarketField, offset: usize) -> Option<f64> {
        self.candle_at(offset).map(|c| match field {
            MarketField::Open => c.open,
            MarketField::High => c.high,
            MarketField::Low => c.low,
            MarketField::Close => c.close,
            MarketField::Volume => c.volume,
        })
    }
}

/// Result history for one indicator, newest last.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSeries {
    pub results: VecDeque<IndicatorResult<IndicatorValue>>,
}

impl IndicatorSeries {
    pub fn from_results(results: VecDeque<IndicatorResult<IndicatorValue>>) -> Self {
        Self { results }
    }

    pub fn latest(&self) -> Option<&IndicatorResult<IndicatorValue>> {
        self.results.back()
    }

    /// Result `offset` samples back; 0 is the latest.
    pub fn at_offset(&self, offset: usize) -> Option<&IndicatorResult<IndicatorValue>> {
        let len = self.results.len();
        if offset >= len {
            None
        } else {
            self.results.get(len - 1 - offset)
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Variables visible to expressions, partitioned by scope. Session scope is
/// writable during a walk (mathematical conditions store results there);
/// strategy and global scopes are fixed at context construction.
#[derive(Debug, Default)]
pub struct VariableStore {
    session: RwLock<HashMap<String, f64>>,
    strategy: HashMap<String, f64>,
    global: HashMap<String, f64>,
}

impl VariableStore {
    pub fn new(strategy: HashMap<String, f64>, global: HashMap<String, f64>) -> Self {
        Self {
            session: RwLock::new(HashMap::new()),
            strategy,
            global,
        }
    }

    /// Look up a variable; unset variables resolve to 0.0.
    pub fn get(&self, name: &str, scope: VariableScope) -> f64 {
        match scope {
            VariableScope::Session => self
                .session
                .read()
                .ok()
                .and_then(|m| m.get(name).copied())
                .unwrap_or(0.0),
            VariableScope::Strategy => self.strategy.get(name).copied().unwrap_or(0.0),
            VariableScope::Global => self.global.get(name).copied().unwrap_or(0.0),
        }
    }

    pub fn set_session(&self, name: &str, value: f64) {
        if let Ok(mut session) = self.session.write() {
            session.insert(name.to_string(), value);
        }
    }
}

/// Snapshot built per evaluation request and discarded after the result is
/// produced. Shared read-only across the expression tree walk.
#[derive(Debug)]
pub struct EvaluationContext {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub market: MarketWindow,
    pub indicators: HashMap<String, IndicatorSeries>,
    pub variables: VariableStore,
    pub execution_id: uuid::Uuid,
    pub strategy_id: Option<String>,
    pub start_time: Instant,
    pub max_execution_time: Duration,
}

impl EvaluationContext {
    pub fn new(symbol: &str, timeframe: Timeframe, market: MarketWindow) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            timestamp: market.current.timestamp,
            market,
            indicators: HashMap::new(),
            variables: VariableStore::default(),
            execution_id: uuid::Uuid::new_v4(),
            strategy_id: None,
            start_time: Instant::now(),
            max_execution_time: Duration::from_secs(5),
        }
    }

    pub fn with_indicator(mut self, id: &str, series: IndicatorSeries) -> Self {
        self.indicators.insert(id.to_string(), series);
        self
    }

    pub fn with_variables(mut self, variables: VariableStore) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_strategy_id(mut self, strategy_id: &str) -> Self {
        self.strategy_id = Some(strategy_id.to_string());
        self
    }

    pub fn with_max_execution_time(mut self, budget: Duration) -> Self {
        self.max_execution_time = budget;
        self
    }

    pub fn indicator(&self, id: &str) -> Option<&IndicatorSeries> {
        self.indicators.get(id)
    }

    /// Wall-clock budget left for this evaluation.
    pub fn remaining_budget(&self) -> Duration {
        self.max_execution_time
            .saturating_sub(self.start_time.elapsed())
    }
}
