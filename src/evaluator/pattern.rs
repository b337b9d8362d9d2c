//! Shape detection over value-expression series.
//!
//! Each detector scans the last `lookback_periods` samples of the source
//! series and yields a confidence in [0, 1]; the condition succeeds when
//! that confidence clears the threshold configured on the expression.

use crate::common::math::linear_slope;
use crate::evaluator::error::EvaluationError;
use crate::evaluator::value::ValueResolver;
use crate::models::expression::{PatternKind, ValueExpr};
use serde_json::Value;
use std::collections::HashMap;

const DEFAULT_PEAK_TOLERANCE: f64 = 0.015;
const DEPTH_SCALE: f64 = 0.05;
const FLAT_SLOPE: f64 = 0.005;
const TREND_SLOPE: f64 = 0.02;

pub fn evaluate(
    resolver: &ValueResolver<'_>,
    kind: PatternKind,
    source: &ValueExpr,
    lookback_periods: usize,
    params: &HashMap<String, Value>,
) -> Result<f64, EvaluationError> {
    let lookback = lookback_periods.max(3);

    // Oldest → newest.
    let mut series = Vec::with_capacity(lookback);
    for shift in (0..lookback).rev() {
        series.push(resolver.resolve_at(source, shift)?);
    }

    let peak_tolerance = params
        .get("peak_tolerance")
        .and_then(|v| v.as_f64())
        .unwrap_or(DEFAULT_PEAK_TOLERANCE);

    let confidence = match kind {
        PatternKind::HigherHighs => monotonic_fraction(&series, f64::gt),
        PatternKind::LowerLows => monotonic_fraction(&series, f64::lt),
        PatternKind::DoubleTop => double_extreme(&series, peak_tolerance, true),
        PatternKind::DoubleBottom => double_extreme(&series, peak_tolerance, false),
        PatternKind::HeadAndShoulders => head_and_shoulders(&series, peak_tolerance),
        PatternKind::AscendingTriangle => triangle(&series, TriangleShape::Ascending),
        PatternKind::DescendingTriangle => triangle(&series, TriangleShape::Descending),
        PatternKind::SymmetricalTriangle => triangle(&series, TriangleShape::Symmetrical),
    };

    Ok(confidence.clamp(0.0, 1.0))
}

/// Fraction of consecutive steps satisfying the comparison.
fn monotonic_fraction(series: &[f64], cmp: impl Fn(&f64, &f64) -> bool) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let steps = series.len() - 1;
    let hits = series.windows(2).filter(|w| cmp(&w[1], &w[0])).count();
    hits as f64 / steps as f64
}

/// Indices of interior local maxima (or minima when `maxima` is false).
fn local_extrema(series: &[f64], maxima: bool) -> Vec<usize> {
    let mut indices = Vec::new();
    for i in 1..series.len().saturating_sub(1) {
        let is_extreme = if maxima {
            series[i] >= series[i - 1] && series[i] >= series[i + 1]
        } else {
            series[i] <= series[i - 1] && series[i] <= series[i + 1]
        };
        if is_extreme {
            indices.push(i);
        }
    }
    indices
}

/// Two similar peaks (troughs) separated by a pullback between them.
fn double_extreme(series: &[f64], tolerance: f64, top: bool) -> f64 {
    if series.len() < 5 {
        return 0.0;
    }
    let extrema = local_extrema(series, top);
    if extrema.len() < 2 {
        return 0.0;
    }

    let mut best = 0.0_f64;
    for (a_pos, &i) in extrema.iter().enumerate() {
        for &j in &extrema[a_pos + 1..] {
            if j - i < 2 {
                continue;
            }
            let (first, second) = (series[i], series[j]);
            let scale = first.abs().max(second.abs()).max(f64::MIN_POSITIVE);
            let similarity = 1.0 - (first - second).abs() / scale;
            if similarity < 1.0 - tolerance {
                continue;
            }

            let between = &series[i..=j];
            let pullback = if top {
                let trough = between.iter().copied().fold(f64::INFINITY, f64::min);
                (first.min(second) - trough) / scale
            } else {
                let crest = between.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (crest - first.max(second)) / scale
            };
            if pullback <= 0.0 {
                continue;
            }

            let depth_score = (pullback / DEPTH_SCALE).min(1.0);
            best = best.max(similarity * depth_score);
        }
    }
    best
}

/// Head flanked by two similar, lower shoulders.
fn head_and_shoulders(series: &[f64], tolerance: f64) -> f64 {
    if series.len() < 7 {
        return 0.0;
    }
    let peaks = local_extrema(series, true);
    if peaks.len() < 3 {
        return 0.0;
    }

    let mut best = 0.0_f64;
    for window in peaks.windows(3) {
        let (left, head, right) = (series[window[0]], series[window[1]], series[window[2]]);
        if head <= left || head <= right {
            continue;
        }
        let scale = head.abs().max(f64::MIN_POSITIVE);
        let shoulder_similarity = 1.0 - (left - right).abs() / scale;
        if shoulder_similarity < 1.0 - 2.0 * tolerance {
            continue;
        }
        let prominence = ((head - left.max(right)) / scale / DEPTH_SCALE).min(1.0);
        best = best.max(shoulder_similarity * prominence);
    }
    best
}

enum TriangleShape {
    Ascending,
    Descending,
    Symmetrical,
}

/// Triangles from the slopes of the upper and lower envelopes, normalized
/// by the series mean so thresholds are scale-free.
fn triangle(series: &[f64], shape: TriangleShape) -> f64 {
    if series.len() < 6 {
        return 0.0;
    }
    let highs: Vec<f64> = local_extrema(series, true)
        .iter()
        .map(|&i| series[i])
        .collect();
    let lows: Vec<f64> = local_extrema(series, false)
        .iter()
        .map(|&i| series[i])
        .collect();
    if highs.len() < 2 || lows.len() < 2 {
        return 0.0;
    }

    let mean = series.iter().sum::<f64>() / series.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let upper = linear_slope(&highs) / mean.abs();
    let lower = linear_slope(&lows) / mean.abs();

    let flat = |slope: f64| (1.0 - (slope.abs() / FLAT_SLOPE)).max(0.0);
    let rising = |slope: f64| (slope / TREND_SLOPE).clamp(0.0, 1.0);
    let falling = |slope: f64| (-slope / TREND_SLOPE).clamp(0.0, 1.0);

    match shape {
        TriangleShape::Ascending => flat(upper).min(rising(lower)),
        TriangleShape::Descending => flat(lower).min(falling(upper)),
        TriangleShape::Symmetrical => falling(upper).min(rising(lower)),
    }
}
