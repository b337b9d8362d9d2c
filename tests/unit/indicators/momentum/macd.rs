//! Unit tests for the MACD indicator

use chrono::Utc;
use signatrix::indicators::lifecycle::{IndicatorState, StreamingIndicator};
use signatrix::indicators::momentum::{Macd, MacdConfig};
use signatrix::models::candle::Candle;

fn candle(close: f64) -> Candle {
    Candle::new(close, close + 0.5, close - 0.5, close, 1000.0, Utc::now())
}

fn wavy_closes(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| 100.0 + (i as f64 * 0.3) + ((i % 5) as f64 - 2.0))
        .collect()
}

#[test]
fn test_macd_rejects_fast_not_below_slow() {
    assert!(Macd::new(MacdConfig::new(26, 12, 9)).is_err());
    assert!(Macd::new(MacdConfig::new(12, 12, 9)).is_err());
    assert!(Macd::new(MacdConfig::new(12, 26, 9)).is_ok());
}

#[test]
fn test_macd_signal_zero_until_warm() {
    let mut macd = Macd::new(MacdConfig::new(3, 5, 4)).unwrap();
    // First MACD sample appears at the 5th candle; the signal line needs 4
    // MACD samples, so it stays 0 through candle 7.
    for (i, close) in wavy_closes(7).into_iter().enumerate() {
        let result = macd.update(&candle(close));
        assert_eq!(result.value.signal, 0.0, "candle {}", i);
        assert!(!result.is_valid);
    }
    let result = macd.update(&candle(110.0));
    assert_ne!(result.value.signal, 0.0);
    assert!(result.is_valid);
    assert_eq!(macd.state(), IndicatorState::Ready);
}

#[test]
fn test_macd_batch_streaming_equivalence() {
    let candles: Vec<Candle> = wavy_closes(80).into_iter().map(candle).collect();

    let template = Macd::new(MacdConfig::new(12, 26, 9)).unwrap();
    let mut streaming = Macd::new(MacdConfig::new(12, 26, 9)).unwrap();

    let mut last = None;
    for c in &candles {
        last = Some(streaming.update(c));
    }
    let streamed = last.unwrap();
    let batch = template.calculate(&candles);

    assert!((streamed.value.macd - batch.value.macd).abs() < 1e-9);
    assert!((streamed.value.signal - batch.value.signal).abs() < 1e-9);
    assert!((streamed.value.histogram - batch.value.histogram).abs() < 1e-9);
}

#[test]
fn test_macd_histogram_is_line_minus_signal() {
    let mut macd = Macd::new(MacdConfig::new(3, 6, 3)).unwrap();
    let mut last = None;
    for close in wavy_closes(30) {
        last = Some(macd.update(&candle(close)));
    }
    let out = last.unwrap().value;
    assert!((out.histogram - (out.macd - out.signal)).abs() < 1e-12);
}

#[test]
fn test_macd_reset_restarts_warm_up() {
    let mut macd = Macd::new(MacdConfig::new(3, 5, 4)).unwrap();
    for close in wavy_closes(20) {
        macd.update(&candle(close));
    }
    assert_eq!(macd.state(), IndicatorState::Ready);

    macd.reset();
    assert_eq!(macd.state(), IndicatorState::Uninitialized);
    let result = macd.update(&candle(100.0));
    assert_eq!(result.value.macd, 0.0);
    assert!(!result.is_valid);
}
