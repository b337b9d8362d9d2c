//! Unit tests for the RSI indicator

use chrono::Utc;
use signatrix::indicators::lifecycle::StreamingIndicator;
use signatrix::indicators::momentum::{Rsi, RsiConfig, RsiZone};
use signatrix::models::candle::Candle;

fn candle(close: f64) -> Candle {
    Candle::new(close, close + 0.5, close - 0.5, close, 1000.0, Utc::now())
}

fn choppy_closes(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| 100.0 + ((i * 7) % 13) as f64 - 6.0)
        .collect()
}

#[test]
fn test_rsi_neutral_before_warm_up() {
    // Fewer than period + 1 prices -> exactly 50.
    let mut rsi = Rsi::new(RsiConfig::new(14)).unwrap();
    for close in choppy_closes(14) {
        let result = rsi.update(&candle(close));
        assert_eq!(result.value, 50.0);
        assert!(!result.is_valid);
    }
}

#[test]
fn test_rsi_bounds() {
    let mut rsi = Rsi::new(RsiConfig::new(14)).unwrap();
    for close in choppy_closes(200) {
        let result = rsi.update(&candle(close));
        assert!(result.value >= 0.0 && result.value <= 100.0);
    }
}

#[test]
fn test_rsi_all_gains_is_100() {
    let mut rsi = Rsi::new(RsiConfig::new(5)).unwrap();
    let mut last = 50.0;
    for i in 0..10 {
        last = rsi.update(&candle(100.0 + i as f64)).value;
    }
    assert_eq!(last, 100.0);
}

#[test]
fn test_rsi_flat_series_is_neutral() {
    // No gains and no losses: avg_loss == 0 with avg_gain == 0 -> 50.
    let mut rsi = Rsi::new(RsiConfig::new(5)).unwrap();
    let mut last = 0.0;
    for _ in 0..10 {
        last = rsi.update(&candle(100.0)).value;
    }
    assert_eq!(last, 50.0);
}

#[test]
fn test_rsi_batch_streaming_equivalence() {
    let closes = choppy_closes(60);
    let candles: Vec<Candle> = closes.iter().map(|c| candle(*c)).collect();

    let template = Rsi::new(RsiConfig::new(14)).unwrap();
    let mut streaming = Rsi::new(RsiConfig::new(14)).unwrap();
    let mut last = 0.0;
    for c in &candles {
        last = streaming.update(c).value;
    }
    let batch = template.calculate(&candles);
    assert!((last - batch.value).abs() < 1e-9);
}

#[test]
fn test_rsi_zone_classification() {
    let mut rsi = Rsi::new(RsiConfig::new(5)).unwrap();
    for i in 0..10 {
        rsi.update(&candle(100.0 + i as f64));
    }
    assert_eq!(rsi.zone(), RsiZone::Overbought);

    let mut rsi = Rsi::new(RsiConfig::new(5)).unwrap();
    for i in 0..10 {
        rsi.update(&candle(100.0 - i as f64));
    }
    assert_eq!(rsi.zone(), RsiZone::Oversold);
}

#[test]
fn test_rsi_rejects_bad_levels() {
    let mut config = RsiConfig::new(14);
    config.oversold_level = 70.0;
    config.overbought_level = 30.0;
    assert!(Rsi::new(config).is_err());
}
