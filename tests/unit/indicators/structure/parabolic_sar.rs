//! Unit tests for the Parabolic SAR indicator

use chrono::Utc;
use signatrix::indicators::lifecycle::{IndicatorState, StreamingIndicator};
use signatrix::indicators::structure::{ParabolicSar, SarConfig};
use signatrix::models::candle::Candle;

fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle::new(open, high, low, close, 1000.0, Utc::now())
}

#[test]
fn test_seed_uptrend() {
    // Two seed candles {low=100, high=110}, rising close -> trend=1,
    // SAR=100, EP=110.
    let mut sar = ParabolicSar::new(SarConfig::default()).unwrap();
    sar.update(&candle(104.0, 110.0, 100.0, 105.0));
    let result = sar.update(&candle(105.0, 110.0, 100.0, 106.0));

    assert_eq!(result.value.trend, 1);
    assert_eq!(result.value.value, 100.0);
    assert_eq!(result.value.extreme_point, 110.0);
    assert_eq!(result.value.acceleration, 0.02);
    assert_eq!(sar.state(), IndicatorState::Ready);
}

#[test]
fn test_flip_resets_to_prior_extreme() {
    let mut sar = ParabolicSar::new(SarConfig::default()).unwrap();
    sar.update(&candle(104.0, 110.0, 100.0, 105.0));
    sar.update(&candle(105.0, 110.0, 100.0, 106.0));

    // Low of 99 is at or below the advanced SAR -> downtrend flip: SAR
    // jumps to the prior EP (110) and AF returns to the initial factor.
    let result = sar.update(&candle(105.0, 106.0, 99.0, 100.0));
    assert_eq!(result.value.trend, -1);
    assert_eq!(result.value.value, 110.0);
    assert_eq!(result.value.extreme_point, 99.0);
    assert_eq!(result.value.acceleration, 0.02);
    assert!(sar.reversed());
}

#[test]
fn test_af_grows_on_new_extreme() {
    let mut sar = ParabolicSar::new(SarConfig::default()).unwrap();
    sar.update(&candle(104.0, 110.0, 100.0, 105.0));
    sar.update(&candle(105.0, 110.0, 100.0, 106.0));

    let result = sar.update(&candle(106.0, 112.0, 105.0, 111.0));
    assert_eq!(result.value.trend, 1);
    assert_eq!(result.value.extreme_point, 112.0);
    assert!((result.value.acceleration - 0.04).abs() < 1e-12);
}

#[test]
fn test_af_capped_at_max() {
    let mut sar = ParabolicSar::new(SarConfig::default()).unwrap();
    sar.update(&candle(100.0, 101.0, 99.0, 100.5));
    sar.update(&candle(100.5, 102.0, 100.0, 101.5));
    // Keep making new highs well past the cap.
    for i in 0..15 {
        let base = 102.0 + i as f64;
        sar.update(&candle(base, base + 1.0, base - 0.5, base + 0.8));
    }
    let out = sar.output().unwrap();
    assert!((out.acceleration - 0.2).abs() < 1e-12);
}

#[test]
fn test_batch_streaming_equivalence() {
    let candles = vec![
        candle(104.0, 110.0, 100.0, 105.0),
        candle(105.0, 110.0, 100.0, 106.0),
        candle(106.0, 112.0, 105.0, 111.0),
        candle(111.0, 113.0, 108.0, 109.0),
        candle(109.0, 110.0, 99.0, 100.0),
        candle(100.0, 104.0, 98.0, 103.0),
    ];

    let template = ParabolicSar::new(SarConfig::default()).unwrap();
    let mut streaming = ParabolicSar::new(SarConfig::default()).unwrap();
    let mut last = None;
    for c in &candles {
        last = Some(streaming.update(c));
    }
    let streamed = last.unwrap().value;
    let batch = template.calculate(&candles).value;

    assert_eq!(streamed.trend, batch.trend);
    assert!((streamed.value - batch.value).abs() < 1e-9);
    assert!((streamed.extreme_point - batch.extreme_point).abs() < 1e-9);
}

#[test]
fn test_rejects_bad_config() {
    let config = SarConfig {
        initial_af: 0.3,
        af_increment: 0.02,
        max_af: 0.2,
    };
    assert!(ParabolicSar::new(config).is_err());
}
