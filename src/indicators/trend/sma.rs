//! SMA (Simple Moving Average) indicator

use crate::common::window::RollingWindow;
use crate::indicators::error::IndicatorError;
use crate::indicators::lifecycle::{
    IndicatorState, ResultHistory, StreamingIndicator, TrendDirection,
};
use crate::models::candle::{Candle, PriceType};
use crate::models::indicators::IndicatorResult;
use chrono::{DateTime, Utc};

const HISTORY_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct SmaConfig {
    pub period: usize,
    pub price_type: PriceType,
}

impl SmaConfig {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            price_type: PriceType::default(),
        }
    }

    fn validate(&self) -> Result<(), IndicatorError> {
        if self.period == 0 {
            return Err(IndicatorError::config("SMA period must be > 0"));
        }
        Ok(())
    }
}

/// Streaming SMA backed by a rolling window with a running sum.
///
/// Emits the average of the samples seen so far until the window fills,
/// then the windowed average; an empty buffer reports 0.
#[derive(Debug, Clone)]
pub struct Sma {
    config: SmaConfig,
    window: RollingWindow,
    state: IndicatorState,
    history: ResultHistory<f64>,
}

impl Sma {
    pub fn new(config: SmaConfig) -> Result<Self, IndicatorError> {
        config.validate()?;
        let window = RollingWindow::new(config.period);
        Ok(Self {
            config,
            window,
            state: IndicatorState::Uninitialized,
            history: ResultHistory::new(HISTORY_CAPACITY),
        })
    }

    pub fn period(&self) -> usize {
        self.config.period
    }

    pub fn value(&self) -> f64 {
        self.window.mean()
    }

    /// One-shot batch value over a price slice: the mean of the trailing
    /// min(len, period) samples, 0 when the slice is empty.
    pub fn batch_value(prices: &[f64], period: usize) -> f64 {
        if prices.is_empty() {
            return 0.0;
        }
        let take = period.min(prices.len());
        prices[prices.len() - take..].iter().sum::<f64>() / take as f64
    }

    pub fn direction(&self, lookback: usize) -> TrendDirection {
        self.history.direction(lookback, |v| *v)
    }

    pub fn crossed_above(&self, threshold: f64) -> bool {
        self.history.crossed_above(threshold, |v| *v)
    }

    pub fn crossed_below(&self, threshold: f64) -> bool {
        self.history.crossed_below(threshold, |v| *v)
    }

    fn result(&self, timestamp: DateTime<Utc>) -> IndicatorResult<f64> {
        IndicatorResult::new(self.value(), timestamp, self.state == IndicatorState::Ready)
    }
}

impl StreamingIndicator for Sma {
    type Output = f64;

    fn state(&self) -> IndicatorState {
        self.state
    }

    fn update(&mut self, candle: &Candle) -> IndicatorResult<f64> {
        self.window.push(candle.price(self.config.price_type));
        self.state = if self.window.is_full() {
            IndicatorState::Ready
        } else {
            IndicatorState::WarmingUp
        };
        let result = self.result(candle.timestamp);
        self.history.push(result.clone());
        result
    }

    fn calculate(&self, history: &[Candle]) -> IndicatorResult<f64> {
        let prices: Vec<f64> = history
            .iter()
            .map(|c| c.price(self.config.price_type))
            .collect();
        let value = Self::batch_value(&prices, self.config.period);
        let timestamp = history
            .last()
            .map(|c| c.timestamp)
            .unwrap_or_else(Utc::now);
        IndicatorResult::new(value, timestamp, prices.len() >= self.config.period)
    }

    fn reset(&mut self) {
        self.window.clear();
        self.history.clear();
        self.state = IndicatorState::Uninitialized;
    }
}
