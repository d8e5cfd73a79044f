//! Keyword analyzer (spec.md §4.1 analyzer 1). Pure function of the query
//! string — cacheable, and the first thing to run since it needs no context.

use crate::catalog::keywords::{DetectorConfig, KeywordSet};
use crate::catalog::Category;
use indexmap::IndexMap;

/// File extensions considered "code" — used both by the context analyzer's
/// quality credit and the safe-default quality bump (spec.md §4.1 analyzer
/// 2 and step 4).
pub const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "tsx", "jsx", "go", "java", "c", "cpp", "h", "hpp", "rb", "php",
];

pub async fn analyze(
    query_lower: &str,
    config: &DetectorConfig,
) -> (IndexMap<Category, f64>, f64) {
    let mut scores = IndexMap::new();
    for (category, set) in &config.keywords {
        scores.insert(*category, score_category(query_lower, set));
    }
    (scores, 1.0)
}

fn score_category(query_lower: &str, set: &KeywordSet) -> f64 {
    let mut score = 0.0;
    for kw in &set.direct {
        if query_lower.contains(kw) {
            score += set.base_confidence * KeywordSet::DIRECT_WEIGHT;
        }
    }
    for kw in &set.contextual {
        if query_lower.contains(kw) {
            score += set.base_confidence * KeywordSet::CONTEXTUAL_WEIGHT;
        }
    }
    for kw in &set.action {
        if query_lower.contains(kw) {
            score += set.base_confidence * KeywordSet::ACTION_WEIGHT;
        }
    }
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn git_keywords_score_the_git_category() {
        let config = DetectorConfig::default();
        let (scores, confidence) = analyze("please commit and push my changes", &config).await;
        assert!(scores[&Category::Git] > 0.0);
        assert_eq!(confidence, 1.0);
    }

    #[tokio::test]
    async fn scores_are_clamped_to_one() {
        let config = DetectorConfig::default();
        let (scores, _) =
            analyze("git commit push pull request branch merge checkout rebase clone", &config)
                .await;
        assert!(scores[&Category::Git] <= 1.0);
    }

    #[tokio::test]
    async fn unrelated_query_scores_zero_for_security() {
        let config = DetectorConfig::default();
        let (scores, _) = analyze("what's the weather", &config).await;
        assert_eq!(scores[&Category::Security], 0.0);
    }
}
