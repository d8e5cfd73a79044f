//! Calibrator (spec.md §4.1 "Calibrator"): per-category piecewise-linear
//! curves, then a global complexity modifier derived from the query.

use crate::catalog::keywords::{CalibrationCurve, COMPLEXITY_TOKENS};
use crate::catalog::Category;
use indexmap::IndexMap;

/// Word-count and complexity-token thresholds used to estimate how
/// "complex" a query is; not separately configurable, these are the fixed
/// constants spec.md §4.1 describes inline.
const LONG_QUERY_WORDS: f64 = 20.0;
const MANY_COMPLEXITY_TOKENS: f64 = 5.0;

pub fn calibrate(
    raw: &IndexMap<Category, f64>,
    query: &str,
    curves: &IndexMap<Category, CalibrationCurve>,
) -> IndexMap<Category, f64> {
    let mut calibrated = IndexMap::new();
    for category in Category::ALL {
        let score = raw.get(&category).copied().unwrap_or(0.0);
        let curved = curves.get(&category).map(|c| c.apply(score)).unwrap_or(score);
        calibrated.insert(category, curved);
    }

    let complexity = complexity_score(query);
    let modifier = complexity_modifier(complexity);
    for value in calibrated.values_mut() {
        *value = (*value * modifier).clamp(0.0, 1.0);
    }

    calibrated
}

/// Word-count + complexity-token blend in `[0, 1]` (spec.md §4.1
/// "complexity modifier"). Shared by the calibrator's multiplicative
/// dampening and `Detector::decide`'s threshold-shrink rule, which both key
/// off the same `> 0.8` "complex query" reading.
pub fn complexity_score(query: &str) -> f64 {
    let word_count = query.split_whitespace().count() as f64;
    let lower = query.to_lowercase();
    let token_count = COMPLEXITY_TOKENS
        .iter()
        .filter(|t| lower.contains(*t))
        .count() as f64;

    ((word_count / LONG_QUERY_WORDS) * 0.5 + (token_count / MANY_COMPLEXITY_TOKENS) * 0.5).min(1.0)
}

/// `true` when a query is complex enough to count for the "new-user or
/// complex-query" conservative-bias rule (spec.md §4.1 T2 decision).
pub fn is_complex(query: &str) -> bool {
    complexity_score(query) > 0.8
}

fn complexity_modifier(complexity: f64) -> f64 {
    if complexity > 0.8 {
        0.8
    } else if complexity < 0.3 {
        1.1
    } else {
        1.0
    }
}
