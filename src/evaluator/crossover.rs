//! Crossover detection over value-expression series.
//!
//! A crossover is a sign change of (source − reference) between consecutive
//! samples. It is confirmed once the crossed sign has held for
//! `confirmation_periods` consecutive samples and the current magnitude
//! clears `minimum_threshold`; the detector fires exactly once, at the
//! confirming sample, because the sign change is pinned to a fixed distance
//! behind the present.

use crate::evaluator::error::EvaluationError;
use crate::evaluator::value::ValueResolver;
use crate::models::expression::{CrossoverKind, ValueExpr};

#[derive(Debug, Clone)]
pub struct CrossoverOutcome {
    pub fired: bool,
    /// Current (source − reference) difference.
    pub difference: f64,
    pub diffs: Vec<f64>,
}

pub fn evaluate(
    resolver: &ValueResolver<'_>,
    kind: CrossoverKind,
    source: &ValueExpr,
    reference: &ValueExpr,
    confirmation_periods: usize,
    minimum_threshold: Option<f64>,
) -> Result<CrossoverOutcome, EvaluationError> {
    let confirmation = confirmation_periods.max(1);

    // diffs[0] is the current sample, diffs[confirmation] the sample just
    // before the candidate crossing.
    let mut diffs = Vec::with_capacity(confirmation + 1);
    for shift in 0..=confirmation {
        let src = resolver.resolve_at(source, shift)?;
        let reference = resolver.resolve_at(reference, shift)?;
        diffs.push(src - reference);
    }

    let crossed_up =
        diffs[confirmation] <= 0.0 && diffs[..confirmation].iter().all(|d| *d > 0.0);
    let crossed_down =
        diffs[confirmation] >= 0.0 && diffs[..confirmation].iter().all(|d| *d < 0.0);

    let magnitude_ok = minimum_threshold.map_or(true, |min| diffs[0].abs() >= min);

    let fired = magnitude_ok
        && match kind {
            CrossoverKind::CrossUp => crossed_up,
            CrossoverKind::CrossDown => crossed_down,
            CrossoverKind::CrossAny => crossed_up || crossed_down,
        };

    Ok(CrossoverOutcome {
        fired,
        difference: diffs[0],
        diffs,
    })
}
