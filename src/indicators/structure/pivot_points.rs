//! Pivot Points indicator
//!
//! Levels derive from the prior period's high/low/close (DeMark also uses
//! the open), so each ingested candle is one completed period and output
//! starts at the second candle.

use crate::indicators::error::IndicatorError;
use crate::indicators::lifecycle::{IndicatorState, ResultHistory, StreamingIndicator};
use crate::models::candle::Candle;
use crate::models::indicators::{IndicatorResult, PivotOutput};
use chrono::{DateTime, Utc};

const HISTORY_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotKind {
    Standard,
    Fibonacci,
    Woodie,
    Camarilla,
    DeMark,
}

#[derive(Debug, Clone)]
pub struct PivotConfig {
    pub kind: PivotKind,
}

impl PivotConfig {
    pub fn new(kind: PivotKind) -> Self {
        Self { kind }
    }

    fn validate(&self) -> Result<(), IndicatorError> {
        // All variants are total over any prior candle; nothing to reject.
        Ok(())
    }
}

/// Pivot level calculator, recomputed once per period close.
#[derive(Debug, Clone)]
pub struct PivotPoints {
    config: PivotConfig,
    prev: Option<Candle>,
    output: Option<PivotOutput>,
    state: IndicatorState,
    history: ResultHistory<PivotOutput>,
}

impl PivotPoints {
    pub fn new(config: PivotConfig) -> Result<Self, IndicatorError> {
        config.validate()?;
        Ok(Self {
            config,
            prev: None,
            output: None,
            state: IndicatorState::Uninitialized,
            history: ResultHistory::new(HISTORY_CAPACITY),
        })
    }

    pub fn output(&self) -> Option<PivotOutput> {
        self.output
    }

    /// Closest resistance level at or above `price`.
    pub fn nearest_resistance(&self, price: f64) -> Option<f64> {
        let output = self.output?;
        [Some(output.r1), output.r2, output.r3]
            .into_iter()
            .flatten()
            .filter(|level| *level >= price)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Closest support level at or below `price`.
    pub fn nearest_support(&self, price: f64) -> Option<f64> {
        let output = self.output?;
        [Some(output.s1), output.s2, output.s3]
            .into_iter()
            .flatten()
            .filter(|level| *level <= price)
            .max_by(|a, b| a.total_cmp(b))
    }

    fn compute(kind: PivotKind, prior: &Candle) -> PivotOutput {
        let (h, l, c, o) = (prior.high, prior.low, prior.close, prior.open);
        let range = h - l;
        match kind {
            PivotKind::Standard => {
                let p = (h + l + c) / 3.0;
                PivotOutput {
                    pivot: p,
                    r1: 2.0 * p - l,
                    s1: 2.0 * p - h,
                    r2: Some(p + range),
                    s2: Some(p - range),
                    r3: Some(h + 2.0 * (p - l)),
                    s3: Some(l - 2.0 * (h - p)),
                }
            }
            PivotKind::Fibonacci => {
                let p = (h + l + c) / 3.0;
                PivotOutput {
                    pivot: p,
                    r1: p + 0.382 * range,
                    s1: p - 0.382 * range,
                    r2: Some(p + 0.618 * range),
                    s2: Some(p - 0.618 * range),
                    r3: Some(p + range),
                    s3: Some(p - range),
                }
            }
            PivotKind::Woodie => {
                let p = (h + l + 2.0 * c) / 4.0;
                PivotOutput {
                    pivot: p,
                    r1: 2.0 * p - l,
                    s1: 2.0 * p - h,
                    r2: Some(p + range),
                    s2: Some(p - range),
                    r3: None,
                    s3: None,
                }
            }
            PivotKind::Camarilla => PivotOutput {
                pivot: (h + l + c) / 3.0,
                r1: c + 1.1 * range / 12.0,
                s1: c - 1.1 * range / 12.0,
                r2: Some(c + 1.1 * range / 6.0),
                s2: Some(c - 1.1 * range / 6.0),
                r3: Some(c + 1.1 * range / 4.0),
                s3: Some(c - 1.1 * range / 4.0),
            },
            PivotKind::DeMark => {
                // X branches on the close-vs-open relation of the prior period.
                let x = if c < o {
                    h + 2.0 * l + c
                } else if c > o {
                    2.0 * h + l + c
                } else {
                    h + l + 2.0 * c
                };
                PivotOutput {
                    pivot: x / 4.0,
                    r1: x / 2.0 - l,
                    s1: x / 2.0 - h,
                    r2: None,
                    s2: None,
                    r3: None,
                    s3: None,
                }
            }
        }
    }

    fn neutral(timestamp: DateTime<Utc>) -> IndicatorResult<PivotOutput> {
        IndicatorResult::new(
            PivotOutput {
                pivot: 0.0,
                r1: 0.0,
                s1: 0.0,
                r2: None,
                s2: None,
                r3: None,
                s3: None,
            },
            timestamp,
            false,
        )
    }
}

impl StreamingIndicator for PivotPoints {
    type Output = PivotOutput;

    fn state(&self) -> IndicatorState {
        self.state
    }

    fn update(&mut self, candle: &Candle) -> IndicatorResult<PivotOutput> {
        let result = match &self.prev {
            Some(prior) => {
                let output = Self::compute(self.config.kind, prior);
                self.output = Some(output);
                self.state = IndicatorState::Ready;
                IndicatorResult::new(output, candle.timestamp, true)
            }
            None => {
                self.state = IndicatorState::WarmingUp;
                Self::neutral(candle.timestamp)
            }
        };
        self.prev = Some(candle.clone());
        self.history.push(result.clone());
        result
    }

    fn calculate(&self, history: &[Candle]) -> IndicatorResult<PivotOutput> {
        let timestamp = history
            .last()
            .map(|c| c.timestamp)
            .unwrap_or_else(Utc::now);
        if history.len() < 2 {
            return Self::neutral(timestamp);
        }
        let prior = &history[history.len() - 2];
        let output = Self::compute(self.config.kind, prior);
        IndicatorResult::new(output, timestamp, true)
    }

    fn reset(&mut self) {
        self.prev = None;
        self.output = None;
        self.history.clear();
        self.state = IndicatorState::Uninitialized;
    }
}
