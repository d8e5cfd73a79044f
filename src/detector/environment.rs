//! Environment analyzer (spec.md §4.1 analyzer 3): booleans/ints on the
//! ambient `Context` contribute fixed increments to specific categories.

use super::Context;
use crate::catalog::keywords::DetectorConfig;
use crate::catalog::Category;
use indexmap::IndexMap;

pub async fn analyze(context: &Context, config: &DetectorConfig) -> (IndexMap<Category, f64>, f64) {
    let rules = &config.environment_rules;
    let mut scores = IndexMap::new();
    for category in Category::ALL {
        scores.insert(category, 0.0);
    }

    let mut apply = |active: bool, rule: &(f64, Vec<Category>)| {
        if !active {
            return;
        }
        let (increment, categories) = rule;
        for category in categories {
            let entry = scores.entry(*category).or_insert(0.0);
            *entry = (*entry + increment).min(1.0);
        }
    };

    apply(context.has_uncommitted_changes, &rules.has_uncommitted_changes);
    apply(context.has_merge_conflicts, &rules.has_merge_conflicts);
    apply(context.recent_commits > 0, &rules.recent_commits);
    apply(context.has_test_directories, &rules.has_test_directories);
    apply(context.has_security_files, &rules.has_security_files);
    apply(context.has_ci_files, &rules.has_ci_files);
    apply(context.has_docs, &rules.has_docs);

    (scores, 1.0)
}
