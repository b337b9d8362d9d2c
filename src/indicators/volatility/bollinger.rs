//! Bollinger Bands indicator
//!
//! Middle Band = SMA(period)
//! Upper Band = Middle + (multiplier * sample standard deviation)
//! Lower Band = Middle - (multiplier * sample standard deviation)

use crate::common::window::RollingWindow;
use crate::indicators::error::IndicatorError;
use crate::indicators::lifecycle::{IndicatorState, ResultHistory, StreamingIndicator};
use crate::models::candle::{Candle, PriceType};
use crate::models::indicators::{BollingerOutput, IndicatorResult};
use chrono::{DateTime, Utc};

const SQUEEZE_BANDWIDTH: f64 = 0.1;
const EXPANSION_BANDWIDTH: f64 = 0.25;
const HISTORY_CAPACITY: usize = 64;

/// Bandwidth regime classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandState {
    Squeeze,
    Normal,
    Expansion,
}

#[derive(Debug, Clone)]
pub struct BollingerConfig {
    pub period: usize,
    pub std_dev_multiplier: f64,
    pub price_type: PriceType,
}

impl BollingerConfig {
    pub fn new(period: usize, std_dev_multiplier: f64) -> Self {
        Self {
            period,
            std_dev_multiplier,
            price_type: PriceType::default(),
        }
    }

    fn validate(&self) -> Result<(), IndicatorError> {
        if self.period < 2 {
            return Err(IndicatorError::config(
                "Bollinger period must be at least 2",
            ));
        }
        if self.std_dev_multiplier <= 0.0 {
            return Err(IndicatorError::config(
                "Bollinger std-dev multiplier must be > 0",
            ));
        }
        Ok(())
    }
}

/// Streaming Bollinger Bands over a rolling window with running aggregates.
/// The middle band is by construction the SMA over the same window.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    config: BollingerConfig,
    window: RollingWindow,
    output: BollingerOutput,
    state: IndicatorState,
    history: ResultHistory<BollingerOutput>,
}

impl BollingerBands {
    pub fn new(config: BollingerConfig) -> Result<Self, IndicatorError> {
        config.validate()?;
        let window = RollingWindow::new(config.period);
        Ok(Self {
            config,
            window,
            output: BollingerOutput {
                upper: 0.0,
                middle: 0.0,
                lower: 0.0,
                bandwidth: 0.0,
            },
            state: IndicatorState::Uninitialized,
            history: ResultHistory::new(HISTORY_CAPACITY),
        })
    }

    pub fn output(&self) -> BollingerOutput {
        self.output
    }

    pub fn band_state(&self) -> BandState {
        if self.output.bandwidth < SQUEEZE_BANDWIDTH {
            BandState::Squeeze
        } else if self.output.bandwidth > EXPANSION_BANDWIDTH {
            BandState::Expansion
        } else {
            BandState::Normal
        }
    }

    /// %B: where the price sits between the bands (0 = lower, 1 = upper).
    pub fn percent_b(&self, price: f64) -> f64 {
        let width = self.output.upper - self.output.lower;
        if width == 0.0 {
            return 0.5;
        }
        (price - self.output.lower) / width
    }

    fn bands_from_window(window: &RollingWindow, multiplier: f64) -> BollingerOutput {
        let middle = window.mean();
        let std = window.std_dev();
        let upper = middle + multiplier * std;
        let lower = middle - multiplier * std;
        let bandwidth = if middle == 0.0 {
            0.0
        } else {
            (upper - lower) / middle
        };
        BollingerOutput {
            upper,
            middle,
            lower,
            bandwidth,
        }
    }

    fn result(&self, timestamp: DateTime<Utc>) -> IndicatorResult<BollingerOutput> {
        IndicatorResult::new(self.output, timestamp, self.state == IndicatorState::Ready)
    }
}

impl StreamingIndicator for BollingerBands {
    type Output = BollingerOutput;

    fn state(&self) -> IndicatorState {
        self.state
    }

    fn update(&mut self, candle: &Candle) -> IndicatorResult<BollingerOutput> {
        self.window.push(candle.price(self.config.price_type));
        self.output = Self::bands_from_window(&self.window, self.config.std_dev_multiplier);
        self.state = if self.window.is_full() {
            IndicatorState::Ready
        } else {
            IndicatorState::WarmingUp
        };

        let result = self.result(candle.timestamp);
        self.history.push(result.clone());
        result
    }

    fn calculate(&self, history: &[Candle]) -> IndicatorResult<BollingerOutput> {
        let timestamp = history
            .last()
            .map(|c| c.timestamp)
            .unwrap_or_else(Utc::now);
        let mut window = RollingWindow::new(self.config.period);
        for candle in history {
            window.push(candle.price(self.config.price_type));
        }
        let output = Self::bands_from_window(&window, self.config.std_dev_multiplier);
        IndicatorResult::new(output, timestamp, window.is_full())
    }

    fn reset(&mut self) {
        self.window.clear();
        self.output = BollingerOutput {
            upper: 0.0,
            middle: 0.0,
            lower: 0.0,
            bandwidth: 0.0,
        };
        self.history.clear();
        self.state = IndicatorState::Uninitialized;
    }
}
