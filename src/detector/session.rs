//! Session analyzer (spec.md §4.1 analyzer 4): usage-frequency over the
//! last *k*=10 history entries, plus a Jaccard-similarity boost against
//! recent queries.

use super::SessionView;
use crate::catalog::Category;
use indexmap::IndexMap;
use std::collections::HashSet;

const HISTORY_WINDOW: usize = 10;
const SIMILARITY_WINDOW: usize = 4;
const USAGE_CAP: f64 = 0.6;
const SIMILARITY_THRESHOLD: f64 = 0.7;
const SIMILARITY_BOOST: f64 = 0.3;
const BOOSTED_CAP: f64 = 0.8;

pub async fn analyze(
    query_lower: &str,
    session: &SessionView<'_>,
) -> (IndexMap<Category, f64>, f64) {
    let mut scores = IndexMap::new();
    for category in Category::ALL {
        scores.insert(category, 0.0);
    }

    if session.recent_categories.is_empty() {
        return (scores, 0.0);
    }

    let window = &session.recent_categories[session.recent_categories.len().saturating_sub(HISTORY_WINDOW)..];
    let mut counts: IndexMap<Category, u32> = IndexMap::new();
    for entry in window {
        for (category, on) in entry {
            if *on {
                *counts.entry(*category).or_insert(0) += 1;
            }
        }
    }
    let total = window.len() as f64;
    for (category, count) in &counts {
        scores.insert(*category, ((*count as f64 / total) * USAGE_CAP).min(USAGE_CAP));
    }

    let current_tokens = tokenize(query_lower);
    let recent_start = session.recent_queries.len().saturating_sub(SIMILARITY_WINDOW);
    let boosted = session.recent_queries[recent_start..]
        .iter()
        .any(|prev| jaccard(&current_tokens, &tokenize(prev)) > SIMILARITY_THRESHOLD);

    if boosted {
        for score in scores.values_mut() {
            *score = (*score + SIMILARITY_BOOST).min(BOOSTED_CAP);
        }
    }

    (scores, 1.0)
}

fn tokenize(query: &str) -> HashSet<&str> {
    query.split_whitespace().collect()
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}
