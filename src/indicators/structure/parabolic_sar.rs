//! Parabolic SAR indicator
//!
//! SAR = SAR_prev + AF * (EP - SAR_prev)
//! AF grows by its increment on every new extreme, capped at the maximum.
//! When price crosses the SAR the trend flips: SAR resets to the prior
//! extreme point and AF returns to its initial value.

use crate::indicators::error::IndicatorError;
use crate::indicators::lifecycle::{IndicatorState, ResultHistory, StreamingIndicator};
use crate::models::candle::Candle;
use crate::models::indicators::{IndicatorResult, SarOutput};
use chrono::{DateTime, Utc};

const HISTORY_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct SarConfig {
    pub initial_af: f64,
    pub af_increment: f64,
    pub max_af: f64,
}

impl Default for SarConfig {
    fn default() -> Self {
        Self {
            initial_af: 0.02,
            af_increment: 0.02,
            max_af: 0.2,
        }
    }
}

impl SarConfig {
    fn validate(&self) -> Result<(), IndicatorError> {
        if self.initial_af <= 0.0 || self.af_increment <= 0.0 {
            return Err(IndicatorError::config(
                "SAR acceleration factors must be > 0",
            ));
        }
        if self.max_af < self.initial_af {
            return Err(IndicatorError::config(
                "SAR max acceleration must be at least the initial value",
            ));
        }
        Ok(())
    }
}

/// Streaming Parabolic SAR.
///
/// Two candles seed the trend: rising close starts an uptrend with SAR at
/// the seed low and EP at the seed high, falling close the mirror image.
#[derive(Debug, Clone)]
pub struct ParabolicSar {
    config: SarConfig,
    seed: Option<Candle>,
    output: Option<SarOutput>,
    state: IndicatorState,
    history: ResultHistory<SarOutput>,
}

impl ParabolicSar {
    pub fn new(config: SarConfig) -> Result<Self, IndicatorError> {
        config.validate()?;
        Ok(Self {
            config,
            seed: None,
            output: None,
            state: IndicatorState::Uninitialized,
            history: ResultHistory::new(HISTORY_CAPACITY),
        })
    }

    pub fn output(&self) -> Option<SarOutput> {
        self.output
    }

    pub fn trend(&self) -> i8 {
        self.output.map(|o| o.trend).unwrap_or(0)
    }

    /// The trend flipped on the latest update.
    pub fn reversed(&self) -> bool {
        match (self.history.at_offset(1), self.history.latest()) {
            (Some(prev), Some(last)) => prev.value.trend != last.value.trend,
            _ => false,
        }
    }

    fn seed_output(config: &SarConfig, first: &Candle, second: &Candle) -> SarOutput {
        let rising = second.close > first.close;
        let low = first.low.min(second.low);
        let high = first.high.max(second.high);
        if rising {
            SarOutput {
                value: low,
                trend: 1,
                extreme_point: high,
                acceleration: config.initial_af,
            }
        } else {
            SarOutput {
                value: high,
                trend: -1,
                extreme_point: low,
                acceleration: config.initial_af,
            }
        }
    }

    fn advance(config: &SarConfig, prev: SarOutput, candle: &Candle) -> SarOutput {
        let mut sar = prev.value + prev.acceleration * (prev.extreme_point - prev.value);
        let mut trend = prev.trend;
        let mut ep = prev.extreme_point;
        let mut af = prev.acceleration;

        if trend == 1 {
            if candle.low <= sar {
                // Flip: SAR restarts at the prior extreme, AF at the start.
                trend = -1;
                sar = prev.extreme_point;
                ep = candle.low;
                af = config.initial_af;
            } else if candle.high > ep {
                ep = candle.high;
                af = (af + config.af_increment).min(config.max_af);
            }
        } else if candle.high >= sar {
            trend = 1;
            sar = prev.extreme_point;
            ep = candle.high;
            af = config.initial_af;
        } else if candle.low < ep {
            ep = candle.low;
            af = (af + config.af_increment).min(config.max_af);
        }

        SarOutput {
            value: sar,
            trend,
            extreme_point: ep,
            acceleration: af,
        }
    }

    fn neutral(timestamp: DateTime<Utc>) -> IndicatorResult<SarOutput> {
        IndicatorResult::new(
            SarOutput {
                value: 0.0,
                trend: 0,
                extreme_point: 0.0,
                acceleration: 0.0,
            },
            timestamp,
            false,
        )
    }
}

impl StreamingIndicator for ParabolicSar {
    type Output = SarOutput;

    fn state(&self) -> IndicatorState {
        self.state
    }

    fn update(&mut self, candle: &Candle) -> IndicatorResult<SarOutput> {
        let result = match (self.output, self.seed.take()) {
            (Some(prev), _) => {
                let next = Self::advance(&self.config, prev, candle);
                self.output = Some(next);
                IndicatorResult::new(next, candle.timestamp, true)
            }
            (None, Some(first)) => {
                let seeded = Self::seed_output(&self.config, &first, candle);
                self.output = Some(seeded);
                self.state = IndicatorState::Ready;
                IndicatorResult::new(seeded, candle.timestamp, true)
            }
            (None, None) => {
                self.seed = Some(candle.clone());
                self.state = IndicatorState::WarmingUp;
                Self::neutral(candle.timestamp)
            }
        };
        self.history.push(result.clone());
        result
    }

    fn calculate(&self, history: &[Candle]) -> IndicatorResult<SarOutput> {
        let timestamp = history
            .last()
            .map(|c| c.timestamp)
            .unwrap_or_else(Utc::now);
        if history.len() < 2 {
            return Self::neutral(timestamp);
        }

        let mut output = Self::seed_output(&self.config, &history[0], &history[1]);
        for candle in &history[2..] {
            output = Self::advance(&self.config, output, candle);
        }
        IndicatorResult::new(output, timestamp, true)
    }

    fn reset(&mut self) {
        self.seed = None;
        self.output = None;
        self.history.clear();
        self.state = IndicatorState::Uninitialized;
    }
}
