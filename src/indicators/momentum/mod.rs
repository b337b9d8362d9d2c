//! Momentum indicators: RSI, MACD

pub mod macd;
pub mod rsi;

pub use macd::{Macd, MacdConfig, MacdCrossover};
pub use rsi::{Rsi, RsiConfig, RsiZone};
