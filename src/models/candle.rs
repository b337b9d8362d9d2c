//! OHLCV candle and the price/timeframe vocabulary around it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV candle for a single (symbol, timeframe) period.
///
/// Immutable once ingested. The engine assumes, but does not enforce, that
/// candles arrive in non-decreasing timestamp order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Extract the configured price from this candle.
    pub fn price(&self, price_type: PriceType) -> f64 {
        match price_type {
            PriceType::Open => self.open,
            PriceType::High => self.high,
            PriceType::Low => self.low,
            PriceType::Close => self.close,
            PriceType::Hl2 => (self.high + self.low) / 2.0,
            PriceType::Hlc3 => (self.high + self.low + self.close) / 3.0,
            PriceType::Ohlc4 => (self.open + self.high + self.low + self.close) / 4.0,
        }
    }
}

/// Which price an indicator consumes from each candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PriceType {
    Open,
    High,
    Low,
    Close,
    Hl2,
    Hlc3,
    Ohlc4,
}

impl Default for PriceType {
    fn default() -> Self {
        PriceType::Close
    }
}

/// Candle timeframe. Keys the adapter's cache space alongside the symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        };
        f.write_str(s)
    }
}
