//! Combines the four analyzers' signal maps into one per-category score
//! (spec.md §4.1 "Scorer").

use crate::catalog::Category;
use indexmap::IndexMap;

pub const KEYWORD_WEIGHT: f64 = 1.0;
pub const CONTEXT_WEIGHT: f64 = 0.7;
pub const ENVIRONMENT_WEIGHT: f64 = 0.6;
pub const SESSION_WEIGHT: f64 = 0.8;

/// `final[c] = Σ(signal_score[c] × signal_weight × signal_confidence)`,
/// then scaled back into `[0, 1]` proportionally if any category exceeds 1.0.
pub fn combine(signals: &[(IndexMap<Category, f64>, f64, f64)]) -> IndexMap<Category, f64> {
    let mut totals = IndexMap::new();
    for category in Category::ALL {
        totals.insert(category, 0.0);
    }

    for (scores, weight, confidence) in signals {
        for (category, score) in scores {
            let entry = totals.entry(*category).or_insert(0.0);
            *entry += score * weight * confidence;
        }
    }

    let max = totals.values().copied().fold(0.0_f64, f64::max);
    if max > 1.0 {
        for value in totals.values_mut() {
            *value /= max;
        }
    }

    totals
}
