//! Scalar math helpers shared by the indicators and the pattern detectors.

/// Simple moving average of the trailing `period` samples.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let sum: f64 = values[values.len() - period..].iter().sum();
    Some(sum / period as f64)
}

/// EMA smoothing multiplier for a period.
pub fn ema_multiplier(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

/// One step of the EMA recurrence.
pub fn ema_from_previous(value: f64, previous: f64, period: usize) -> f64 {
    let k = ema_multiplier(period);
    (value - previous) * k + previous
}

/// EMA over a full series, seeded with the SMA of the first `period` samples.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    let mut current = seed;
    for &value in &values[period..] {
        current = ema_from_previous(value, current, period);
    }
    Some(current)
}

/// Least-squares slope of a series against its index. Used by the triangle
/// pattern detectors to classify converging highs/lows.
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n_f;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Incremental EMA over a scalar sequence.
///
/// Seeded with the SMA of the first `period` samples, then the standard
/// recurrence. This is the streaming counterpart of [`ema`] and produces the
/// same sequence sample-for-sample.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    seed_sum: f64,
    count: usize,
    current: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            seed_sum: 0.0,
            count: 0,
            current: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Feed one sample; returns the EMA once seeded, `None` while warming up.
    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.count += 1;
        match self.current {
            Some(previous) => {
                let next = ema_from_previous(value, previous, self.period);
                self.current = Some(next);
                Some(next)
            }
            None => {
                self.seed_sum += value;
                if self.count >= self.period {
                    let seed = self.seed_sum / self.period as f64;
                    self.current = Some(seed);
                    Some(seed)
                } else {
                    None
                }
            }
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.current
    }

    pub fn is_ready(&self) -> bool {
        self.current.is_some()
    }

    pub fn samples_seen(&self) -> usize {
        self.count
    }

    pub fn reset(&mut self) {
        self.seed_sum = 0.0;
        self.count = 0;
        self.current = None;
    }
}
