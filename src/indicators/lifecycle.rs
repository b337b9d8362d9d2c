//! Shared indicator lifecycle: state machine, dual-path contract, and the
//! bounded result history that backs derived queries.

use crate::models::candle::Candle;
use crate::models::indicators::{IndicatorResult, IndicatorValue};
use std::collections::VecDeque;

/// Lifecycle every indicator moves through. The only way back to
/// `Uninitialized` is an explicit `reset()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    Uninitialized,
    WarmingUp,
    Ready,
}

/// Direction of a series over a lookback window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Rising,
    Falling,
    Flat,
}

/// The dual-path contract all indicators implement.
///
/// `update` is the streaming path: O(1)/O(log n) amortized per candle,
/// applied strictly in arrival order by a single owner. `calculate` is the
/// batch path: a from-scratch pass over a history slice, used for seeding
/// and backtests. The two paths must agree on output for the same prefix.
pub trait StreamingIndicator {
    type Output: Clone + Into<IndicatorValue>;

    fn state(&self) -> IndicatorState;

    /// Apply one candle and produce the next result.
    fn update(&mut self, candle: &Candle) -> IndicatorResult<Self::Output>;

    /// Recompute from scratch over `history`. Empty history yields the
    /// indicator's neutral result with `is_valid = false`.
    fn calculate(&self, history: &[Candle]) -> IndicatorResult<Self::Output>;

    /// Clear all buffers and running state; next push starts warm-up again.
    fn reset(&mut self);
}

/// Bounded window of recent results. Derived queries (trend direction,
/// threshold crossings) are pure functions over this window.
#[derive(Debug, Clone)]
pub struct ResultHistory<T> {
    items: VecDeque<IndicatorResult<T>>,
    capacity: usize,
}

impl<T: Clone> ResultHistory<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, result: IndicatorResult<T>) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(result);
    }

    pub fn latest(&self) -> Option<&IndicatorResult<T>> {
        self.items.back()
    }

    /// Result `offset` samples back; 0 is the latest.
    pub fn at_offset(&self, offset: usize) -> Option<&IndicatorResult<T>> {
        let len = self.items.len();
        if offset >= len {
            None
        } else {
            self.items.get(len - 1 - offset)
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Trend of the projected series over the last `lookback` results.
    pub fn direction(&self, lookback: usize, project: impl Fn(&T) -> f64) -> TrendDirection {
        let newest = match self.latest() {
            Some(r) => project(&r.value),
            None => return TrendDirection::Flat,
        };
        let oldest = match self.at_offset(lookback.min(self.len().saturating_sub(1))) {
            Some(r) => project(&r.value),
            None => return TrendDirection::Flat,
        };
        if newest > oldest {
            TrendDirection::Rising
        } else if newest < oldest {
            TrendDirection::Falling
        } else {
            TrendDirection::Flat
        }
    }

    /// True when the projected series moved from ≤ threshold to > threshold
    /// between the previous and the latest result.
    pub fn crossed_above(&self, threshold: f64, project: impl Fn(&T) -> f64) -> bool {
        match (self.at_offset(1), self.latest()) {
            (Some(prev), Some(last)) => {
                project(&prev.value) <= threshold && project(&last.value) > threshold
            }
            _ => false,
        }
    }

    /// Mirror of [`Self::crossed_above`].
    pub fn crossed_below(&self, threshold: f64, project: impl Fn(&T) -> f64) -> bool {
        match (self.at_offset(1), self.latest()) {
            (Some(prev), Some(last)) => {
                project(&prev.value) >= threshold && project(&last.value) < threshold
            }
            _ => false,
        }
    }
}
