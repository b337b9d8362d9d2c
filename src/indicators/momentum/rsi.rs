//! RSI (Relative Strength Index) indicator
//!
//! RSI = 100 - (100 / (1 + RS))
//! RS = Average Gain / Average Loss, Wilder-smoothed

use crate::indicators::error::IndicatorError;
use crate::indicators::lifecycle::{IndicatorState, ResultHistory, StreamingIndicator};
use crate::models::candle::{Candle, PriceType};
use crate::models::indicators::IndicatorResult;
use chrono::{DateTime, Utc};

const NEUTRAL_RSI: f64 = 50.0;
const HISTORY_CAPACITY: usize = 64;

/// Zone classification relative to the configured levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsiZone {
    Overbought,
    Bullish,
    Neutral,
    Bearish,
    Oversold,
}

#[derive(Debug, Clone)]
pub struct RsiConfig {
    pub period: usize,
    pub price_type: PriceType,
    pub oversold_level: f64,
    pub overbought_level: f64,
}

impl RsiConfig {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            price_type: PriceType::default(),
            oversold_level: 30.0,
            overbought_level: 70.0,
        }
    }

    fn validate(&self) -> Result<(), IndicatorError> {
        if self.period == 0 {
            return Err(IndicatorError::config("RSI period must be > 0"));
        }
        if self.oversold_level >= self.overbought_level {
            return Err(IndicatorError::config(
                "RSI oversold level must be below overbought level",
            ));
        }
        Ok(())
    }
}

/// Streaming Wilder RSI.
///
/// Reports the neutral 50 until `period + 1` prices have been seen. When the
/// smoothed average loss is 0, reports 100 if the average gain is positive
/// and 50 otherwise. Output is clamped to [0, 100].
#[derive(Debug, Clone)]
pub struct Rsi {
    config: RsiConfig,
    prev_price: Option<f64>,
    changes_seen: usize,
    gain_sum: f64,
    loss_sum: f64,
    avg_gain: f64,
    avg_loss: f64,
    value: f64,
    state: IndicatorState,
    history: ResultHistory<f64>,
}

impl Rsi {
    pub fn new(config: RsiConfig) -> Result<Self, IndicatorError> {
        config.validate()?;
        Ok(Self {
            config,
            prev_price: None,
            changes_seen: 0,
            gain_sum: 0.0,
            loss_sum: 0.0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            value: NEUTRAL_RSI,
            state: IndicatorState::Uninitialized,
            history: ResultHistory::new(HISTORY_CAPACITY),
        })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn zone(&self) -> RsiZone {
        let rsi = self.value;
        if rsi >= self.config.overbought_level {
            RsiZone::Overbought
        } else if rsi >= 50.0 {
            RsiZone::Bullish
        } else if rsi >= 40.0 {
            RsiZone::Neutral
        } else if rsi >= self.config.oversold_level {
            RsiZone::Bearish
        } else {
            RsiZone::Oversold
        }
    }

    /// RSI crossed the 50 centerline on the latest update.
    pub fn crossed_centerline_up(&self) -> bool {
        self.history.crossed_above(NEUTRAL_RSI, |v| *v)
    }

    pub fn crossed_centerline_down(&self) -> bool {
        self.history.crossed_below(NEUTRAL_RSI, |v| *v)
    }

    pub fn left_overbought(&self) -> bool {
        self.history.crossed_below(self.config.overbought_level, |v| *v)
    }

    pub fn left_oversold(&self) -> bool {
        self.history.crossed_above(self.config.oversold_level, |v| *v)
    }

    fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
        let rsi = if avg_loss == 0.0 {
            if avg_gain > 0.0 {
                100.0
            } else {
                NEUTRAL_RSI
            }
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - (100.0 / (1.0 + rs))
        };
        rsi.clamp(0.0, 100.0)
    }

    fn result(&self, timestamp: DateTime<Utc>) -> IndicatorResult<f64> {
        IndicatorResult::new(self.value, timestamp, self.state == IndicatorState::Ready)
    }
}

impl StreamingIndicator for Rsi {
    type Output = f64;

    fn state(&self) -> IndicatorState {
        self.state
    }

    fn update(&mut self, candle: &Candle) -> IndicatorResult<f64> {
        let price = candle.price(self.config.price_type);
        let period = self.config.period;

        match self.prev_price {
            None => {
                self.state = IndicatorState::WarmingUp;
            }
            Some(prev) => {
                let change = price - prev;
                let (gain, loss) = if change > 0.0 {
                    (change, 0.0)
                } else {
                    (0.0, change.abs())
                };
                self.changes_seen += 1;

                if self.changes_seen < period {
                    self.gain_sum += gain;
                    self.loss_sum += loss;
                } else if self.changes_seen == period {
                    self.gain_sum += gain;
                    self.loss_sum += loss;
                    self.avg_gain = self.gain_sum / period as f64;
                    self.avg_loss = self.loss_sum / period as f64;
                    self.value = Self::rsi_from_averages(self.avg_gain, self.avg_loss);
                    self.state = IndicatorState::Ready;
                } else {
                    let p = period as f64;
                    self.avg_gain = (self.avg_gain * (p - 1.0) + gain) / p;
                    self.avg_loss = (self.avg_loss * (p - 1.0) + loss) / p;
                    self.value = Self::rsi_from_averages(self.avg_gain, self.avg_loss);
                }
            }
        }
        self.prev_price = Some(price);

        let result = self.result(candle.timestamp);
        self.history.push(result.clone());
        result
    }

    fn calculate(&self, history: &[Candle]) -> IndicatorResult<f64> {
        let period = self.config.period;
        let timestamp = history
            .last()
            .map(|c| c.timestamp)
            .unwrap_or_else(Utc::now);
        let prices: Vec<f64> = history
            .iter()
            .map(|c| c.price(self.config.price_type))
            .collect();

        if prices.len() < period + 1 {
            return IndicatorResult::new(NEUTRAL_RSI, timestamp, false);
        }

        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for i in 1..=period {
            let change = prices[i] - prices[i - 1];
            if change > 0.0 {
                avg_gain += change;
            } else {
                avg_loss += change.abs();
            }
        }
        avg_gain /= period as f64;
        avg_loss /= period as f64;

        let p = period as f64;
        for i in (period + 1)..prices.len() {
            let change = prices[i] - prices[i - 1];
            let (gain, loss) = if change > 0.0 {
                (change, 0.0)
            } else {
                (0.0, change.abs())
            };
            avg_gain = (avg_gain * (p - 1.0) + gain) / p;
            avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        }

        IndicatorResult::new(Self::rsi_from_averages(avg_gain, avg_loss), timestamp, true)
    }

    fn reset(&mut self) {
        self.prev_price = None;
        self.changes_seen = 0;
        self.gain_sum = 0.0;
        self.loss_sum = 0.0;
        self.avg_gain = 0.0;
        self.avg_loss = 0.0;
        self.value = NEUTRAL_RSI;
        self.history.clear();
        self.state = IndicatorState::Uninitialized;
    }
}
