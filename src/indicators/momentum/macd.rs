//! MACD (Moving Average Convergence Divergence) indicator
//!
//! MACD = EMA(fast) - EMA(slow)
//! Signal = EMA(signal_period) of the MACD line
//! Histogram = MACD - Signal

use crate::common::math::Ema;
use crate::indicators::error::IndicatorError;
use crate::indicators::lifecycle::{IndicatorState, ResultHistory, StreamingIndicator};
use crate::models::candle::{Candle, PriceType};
use crate::models::indicators::{IndicatorResult, MacdOutput};
use chrono::{DateTime, Utc};

const CROSSOVER_THRESHOLD: f64 = 0.0001;
const DISTANCE_SCALE: f64 = 50.0;
const HISTORY_CAPACITY: usize = 64;

/// Relationship of the MACD line to its signal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdCrossover {
    None,
    Bullish,
    Bearish,
}

#[derive(Debug, Clone)]
pub struct MacdConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
    pub price_type: PriceType,
}

impl MacdConfig {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast_period,
            slow_period,
            signal_period,
            price_type: PriceType::default(),
        }
    }

    fn validate(&self) -> Result<(), IndicatorError> {
        if self.fast_period == 0 || self.slow_period == 0 || self.signal_period == 0 {
            return Err(IndicatorError::config("MACD periods must be > 0"));
        }
        if self.fast_period >= self.slow_period {
            return Err(IndicatorError::config(
                "MACD fast period must be below slow period",
            ));
        }
        Ok(())
    }
}

/// Streaming MACD over three incremental EMAs.
///
/// The fast and slow EMAs warm up independently; the signal line stays 0
/// until `signal_period` MACD samples exist. The signal line uses the true
/// incremental EMA recurrence, so long streaming runs match the batch path.
#[derive(Debug, Clone)]
pub struct Macd {
    config: MacdConfig,
    fast_ema: Ema,
    slow_ema: Ema,
    signal_ema: Ema,
    output: MacdOutput,
    state: IndicatorState,
    history: ResultHistory<MacdOutput>,
}

impl Macd {
    pub fn new(config: MacdConfig) -> Result<Self, IndicatorError> {
        config.validate()?;
        let fast_ema = Ema::new(config.fast_period);
        let slow_ema = Ema::new(config.slow_period);
        let signal_ema = Ema::new(config.signal_period);
        Ok(Self {
            config,
            fast_ema,
            slow_ema,
            signal_ema,
            output: MacdOutput {
                macd: 0.0,
                signal: 0.0,
                histogram: 0.0,
            },
            state: IndicatorState::Uninitialized,
            history: ResultHistory::new(HISTORY_CAPACITY),
        })
    }

    pub fn output(&self) -> MacdOutput {
        self.output
    }

    /// Crossover classification of the current output, with a strength
    /// score scaled into [0, 1].
    pub fn crossover(&self) -> (MacdCrossover, f64) {
        let diff = self.output.macd - self.output.signal;
        if diff.abs() < CROSSOVER_THRESHOLD {
            (MacdCrossover::None, 0.0)
        } else {
            let strength = (diff.abs() / DISTANCE_SCALE).min(1.0);
            if diff > 0.0 {
                (MacdCrossover::Bullish, strength)
            } else {
                (MacdCrossover::Bearish, strength)
            }
        }
    }

    /// The histogram flipped sign on the latest update.
    pub fn histogram_flipped_positive(&self) -> bool {
        self.history.crossed_above(0.0, |o| o.histogram)
    }

    pub fn histogram_flipped_negative(&self) -> bool {
        self.history.crossed_below(0.0, |o| o.histogram)
    }

    fn result(&self, timestamp: DateTime<Utc>) -> IndicatorResult<MacdOutput> {
        IndicatorResult::new(self.output, timestamp, self.state == IndicatorState::Ready)
    }
}

impl StreamingIndicator for Macd {
    type Output = MacdOutput;

    fn state(&self) -> IndicatorState {
        self.state
    }

    fn update(&mut self, candle: &Candle) -> IndicatorResult<MacdOutput> {
        let price = candle.price(self.config.price_type);
        let fast = self.fast_ema.update(price);
        let slow = self.slow_ema.update(price);

        if let (Some(fast), Some(slow)) = (fast, slow) {
            let macd = fast - slow;
            let signal = self.signal_ema.update(macd).unwrap_or(0.0);
            self.output = MacdOutput {
                macd,
                signal,
                histogram: macd - signal,
            };
            self.state = if self.signal_ema.is_ready() {
                IndicatorState::Ready
            } else {
                IndicatorState::WarmingUp
            };
        } else {
            self.state = IndicatorState::WarmingUp;
        }

        let result = self.result(candle.timestamp);
        self.history.push(result.clone());
        result
    }

    fn calculate(&self, history: &[Candle]) -> IndicatorResult<MacdOutput> {
        let timestamp = history
            .last()
            .map(|c| c.timestamp)
            .unwrap_or_else(Utc::now);

        let mut fast_ema = Ema::new(self.config.fast_period);
        let mut slow_ema = Ema::new(self.config.slow_period);
        let mut signal_ema = Ema::new(self.config.signal_period);
        let mut output = MacdOutput {
            macd: 0.0,
            signal: 0.0,
            histogram: 0.0,
        };

        for candle in history {
            let price = candle.price(self.config.price_type);
            let fast = fast_ema.update(price);
            let slow = slow_ema.update(price);
            if let (Some(fast), Some(slow)) = (fast, slow) {
                let macd = fast - slow;
                let signal = signal_ema.update(macd).unwrap_or(0.0);
                output = MacdOutput {
                    macd,
                    signal,
                    histogram: macd - signal,
                };
            }
        }

        IndicatorResult::new(output, timestamp, signal_ema.is_ready())
    }

    fn reset(&mut self) {
        self.fast_ema.reset();
        self.slow_ema.reset();
        self.signal_ema.reset();
        self.output = MacdOutput {
            macd: 0.0,
            signal: 0.0,
            histogram: 0.0,
        };
        self.history.clear();
        self.state = IndicatorState::Uninitialized;
    }
}
