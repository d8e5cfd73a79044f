//! Context analyzer (spec.md §4.1 analyzer 2): error/performance tokens in
//! the query, scored against a fixed set of categories per the config.

use super::keyword::CODE_EXTENSIONS;
use super::Context;
use crate::catalog::keywords::DetectorConfig;
use crate::catalog::Category;
use indexmap::IndexMap;

pub async fn analyze(
    query_lower: &str,
    context: &Context,
    config: &DetectorConfig,
) -> (IndexMap<Category, f64>, f64) {
    let rules = &config.context_rules;
    let mut scores = IndexMap::new();
    for category in Category::ALL {
        scores.insert(category, 0.0);
    }

    if rules.error_substrings.iter().any(|s| query_lower.contains(s)) {
        for category in &rules.error_categories {
            let entry = scores.entry(*category).or_insert(0.0);
            *entry = (*entry + rules.error_credit).min(1.0);
        }
    }
    if rules.performance_tokens.iter().any(|s| query_lower.contains(s)) {
        for category in &rules.performance_categories {
            let entry = scores.entry(*category).or_insert(0.0);
            *entry = (*entry + rules.performance_credit).min(1.0);
        }
    }
    let has_code_extension = context
        .file_extensions
        .iter()
        .any(|ext| CODE_EXTENSIONS.contains(&ext.trim_start_matches('.')));
    if has_code_extension {
        for category in &rules.file_extension_categories {
            let entry = scores.entry(*category).or_insert(0.0);
            *entry = (*entry + rules.file_extension_credit).min(1.0);
        }
    }

    (scores, 1.0)
}
