//! Task Detector (spec.md §4.1): from a query and ambient context, produce
//! a `DetectionResult` — per-category on/off flags, confidence scores, and
//! a fallback tag explaining how the decision was reached.

mod calibrator;
mod context;
mod environment;
mod keyword;
mod scorer;
mod session;

use crate::catalog::keywords::DetectorConfig;
use crate::catalog::Category;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ambient signal input alongside the query string (spec.md §4.1 analyzers 2-3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    pub file_extensions: Vec<String>,
    pub has_uncommitted_changes: bool,
    pub has_merge_conflicts: bool,
    pub recent_commits: u32,
    pub has_test_directories: bool,
    pub has_tests: bool,
    pub has_security_files: bool,
    pub has_ci_files: bool,
    pub has_docs: bool,
    pub project_type: Option<String>,
}

/// Which analyzer a signal score came from (spec.md §3, kept for
/// observability/tests — `DetectionResult.signals`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Keyword,
    Context,
    Environment,
    Session,
}

/// Reason code attached to a `DetectionResult` (spec.md §3/§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTag {
    None,
    MediumConfidenceExpansion,
    ConservativeBias,
    SafeDefault,
    FullLoadFallback,
    ErrorFallback,
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub categories: IndexMap<Category, bool>,
    pub confidence: IndexMap<Category, f64>,
    pub signals: IndexMap<SignalKind, IndexMap<Category, f64>>,
    pub fallback_tag: FallbackTag,
    pub detection_ms: u64,
}

impl DetectionResult {
    /// The `core, git, analysis` baseline with the contextual bumps from
    /// spec.md §4.1 step 4, used whenever detection bottoms out.
    fn safe_default(tag: FallbackTag, query: &str, context: &Context, detection_ms: u64) -> Self {
        let mut categories = IndexMap::new();
        let mut confidence = IndexMap::new();
        for category in Category::ALL {
            categories.insert(category, false);
            confidence.insert(category, 0.0);
        }
        categories.insert(Category::Core, true);
        categories.insert(Category::Git, true);
        categories.insert(Category::Analysis, true);
        confidence.insert(Category::Core, 1.0);
        confidence.insert(Category::Git, 0.5);
        confidence.insert(Category::Analysis, 0.5);

        if context.project_type.as_deref() == Some("security") {
            categories.insert(Category::Security, true);
            confidence.insert(Category::Security, 0.5);
        }
        if context.has_tests {
            categories.insert(Category::Test, true);
            confidence.insert(Category::Test, 0.5);
        }
        let has_code_extension = context
            .file_extensions
            .iter()
            .any(|ext| keyword::CODE_EXTENSIONS.contains(&ext.trim_start_matches('.')));
        if has_code_extension {
            categories.insert(Category::Quality, true);
            confidence.insert(Category::Quality, 0.5);
        }
        let _ = query;

        Self {
            categories,
            confidence,
            signals: IndexMap::new(),
            fallback_tag: tag,
            detection_ms,
        }
    }
}

/// Pure-data-driven Task Detector. Holds only immutable config (spec.md §9
/// "configuration as value") so it is cheaply `Clone`/`Arc`-shareable.
#[derive(Debug, Clone)]
pub struct Detector {
    config: DetectorConfig,
    t2_threshold: f64,
    t3_threshold: f64,
    conservative_bias_mult: f64,
    budget: Duration,
}

/// Session-shaped view the detector needs without depending on `crate::session`
/// directly (keeps the detector free of cyclic ownership, spec.md §9).
pub struct SessionView<'a> {
    pub recent_queries: &'a [String],
    pub recent_categories: &'a [IndexMap<Category, bool>],
    pub is_new_user: bool,
}

impl Detector {
    pub fn new(config: DetectorConfig, t2_threshold: f64, t3_threshold: f64) -> Self {
        Self {
            config,
            t2_threshold,
            t3_threshold,
            conservative_bias_mult: 0.8,
            budget: Duration::from_millis(50),
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Run all four analyzers under a deadline, score, calibrate, decide.
    /// Never returns an error: any failure degrades to `safe_default`
    /// (spec.md §7 `DETECTION_FAILED` is always recovered locally).
    pub async fn detect(&self, query: &str, context: &Context, session: SessionView<'_>) -> DetectionResult {
        let started = std::time::Instant::now();
        let query_lower = query.to_lowercase();

        let fut = async {
            let (kw, ctx, env, sess) = tokio::join!(
                keyword::analyze(&query_lower, &self.config),
                context::analyze(&query_lower, context, &self.config),
                environment::analyze(context, &self.config),
                session::analyze(&query_lower, &session),
            );
            (kw, ctx, env, sess)
        };

        match tokio::time::timeout(self.budget, fut).await {
            Ok((kw, ctx, env, sess)) => {
                let mut signals = IndexMap::new();
                signals.insert(SignalKind::Keyword, kw.0.clone());
                signals.insert(SignalKind::Context, ctx.0.clone());
                signals.insert(SignalKind::Environment, env.0.clone());
                signals.insert(SignalKind::Session, sess.0.clone());

                let combined = scorer::combine(&[
                    (kw.0, scorer::KEYWORD_WEIGHT, kw.1),
                    (ctx.0, scorer::CONTEXT_WEIGHT, ctx.1),
                    (env.0, scorer::ENVIRONMENT_WEIGHT, env.1),
                    (sess.0, scorer::SESSION_WEIGHT, sess.1),
                ]);

                let calibrated =
                    calibrator::calibrate(&combined, query, &self.config.calibration);

                let mut result = self.decide(calibrated, query, context, session.is_new_user);
                result.signals = signals;
                result.detection_ms = started.elapsed().as_millis() as u64;
                result
            }
            Err(_) => {
                let mut result =
                    DetectionResult::safe_default(FallbackTag::Timeout, query, context, 0);
                result.detection_ms = started.elapsed().as_millis() as u64;
                result
            }
        }
    }

    /// Fallback chain (spec.md §4.1 "Decision"). Operates on already
    /// scored+calibrated per-category confidence.
    fn decide(
        &self,
        confidence: IndexMap<Category, f64>,
        query: &str,
        context: &Context,
        is_new_user: bool,
    ) -> DetectionResult {
        let eff_t2_threshold = if is_new_user || calibrator::is_complex(query) {
            self.t2_threshold * self.conservative_bias_mult
        } else {
            self.t2_threshold
        };

        let mut categories = IndexMap::new();
        let mut bias_promoted = Vec::new();
        for category in Category::ALL {
            let score = confidence.get(&category).copied().unwrap_or(0.0);
            let on = match category.tier() {
                crate::catalog::Tier::T1 => true,
                crate::catalog::Tier::T2 => {
                    let base_on = score >= self.t2_threshold;
                    let bias_on = score >= eff_t2_threshold;
                    if bias_on && !base_on {
                        bias_promoted.push(category);
                    }
                    bias_on
                }
                crate::catalog::Tier::T3 => score >= self.t3_threshold,
            };
            categories.insert(category, on);
        }

        // Spec's fallback chain reads "max score" over the whole calibrated
        // confidence map, not just the tiers whose on/off state it can still
        // move: a confidently git-flavored query (T1) is allowed to settle
        // the chain at step 1 same as a confident T2/T3 one would, even
        // though T1 is already unconditionally enabled.
        let max_score = Category::ALL
            .iter()
            .map(|c| confidence.get(c).copied().unwrap_or(0.0))
            .fold(0.0_f64, f64::max);

        let mut sorted_scores: Vec<f64> = Category::ALL
            .iter()
            .map(|c| confidence.get(c).copied().unwrap_or(0.0))
            .collect();
        sorted_scores.sort_by(|a, b| b.partial_cmp(a).unwrap());
        let ambiguous = sorted_scores.len() >= 2 && (sorted_scores[0] - sorted_scores[1]).abs() < 0.2;

        let tag = if max_score >= 0.8 {
            FallbackTag::None
        } else if max_score >= 0.4 {
            let mut candidates: Vec<Category> = Category::ALL
                .iter()
                .copied()
                .filter(|c| {
                    c.tier() == crate::catalog::Tier::T2
                        && !categories[c]
                        && confidence.get(c).copied().unwrap_or(0.0) >= 0.3
                })
                .collect();
            candidates.sort_by(|a, b| {
                confidence[b]
                    .partial_cmp(&confidence[a])
                    .unwrap()
                    .then(a.cmp(b))
            });
            for category in candidates.into_iter().take(2) {
                categories.insert(category, true);
            }
            FallbackTag::MediumConfidenceExpansion
        } else if !bias_promoted.is_empty() {
            FallbackTag::ConservativeBias
        } else {
            // max_score < 0.4 here; `ambiguous` is checked for documentation
            // parity with spec step 4 but is implied once we reach this arm.
            let _ = ambiguous;
            return DetectionResult::safe_default(FallbackTag::SafeDefault, query, context, 0)
                .with_confidence(confidence);
        };

        DetectionResult {
            categories,
            confidence,
            signals: IndexMap::new(),
            fallback_tag: tag,
            detection_ms: 0,
        }
    }
}

impl DetectionResult {
    fn with_confidence(mut self, confidence: IndexMap<Category, f64>) -> Self {
        self.confidence = confidence;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::keywords::DetectorConfig;

    fn detector() -> Detector {
        Detector::new(DetectorConfig::default(), 0.25, 0.55)
    }

    fn empty_session() -> (Vec<String>, Vec<IndexMap<Category, bool>>) {
        (Vec::new(), Vec::new())
    }

    #[tokio::test]
    async fn empty_query_yields_safe_default() {
        let d = detector();
        let (queries, cats) = empty_session();
        let result = d
            .detect(
                "",
                &Context::default(),
                SessionView {
                    recent_queries: &queries,
                    recent_categories: &cats,
                    is_new_user: false,
                },
            )
            .await;
        assert!(result.categories[&Category::Core]);
        assert!(result.categories[&Category::Git]);
        assert!(result.categories[&Category::Analysis]);
        assert_eq!(result.fallback_tag, FallbackTag::SafeDefault);
    }

    #[tokio::test]
    async fn git_query_enables_git_category() {
        let d = detector();
        let (queries, cats) = empty_session();
        let result = d
            .detect(
                "help me commit my changes and push to remote",
                &Context::default(),
                SessionView {
                    recent_queries: &queries,
                    recent_categories: &cats,
                    is_new_user: false,
                },
            )
            .await;
        assert!(result.categories[&Category::Git]);
        assert!(result.categories[&Category::Core]);
    }

    #[tokio::test]
    async fn debug_query_with_test_context_enables_debug_and_test() {
        let d = detector();
        let context = Context {
            has_tests: true,
            has_test_directories: true,
            file_extensions: vec![".py".into()],
            ..Default::default()
        };
        let (queries, cats) = empty_session();
        let result = d
            .detect(
                "debug the failing authentication tests",
                &context,
                SessionView {
                    recent_queries: &queries,
                    recent_categories: &cats,
                    is_new_user: false,
                },
            )
            .await;
        assert!(result.categories[&Category::Debug]);
    }

    #[tokio::test]
    async fn safe_default_still_carries_contextual_bumps() {
        let d = detector();
        let context = Context {
            has_tests: true,
            ..Default::default()
        };
        let (queries, cats) = empty_session();
        let result = d
            .detect(
                "zzz qqq unrelated gibberish",
                &context,
                SessionView {
                    recent_queries: &queries,
                    recent_categories: &cats,
                    is_new_user: false,
                },
            )
            .await;
        assert_eq!(result.fallback_tag, FallbackTag::SafeDefault);
        assert!(result.categories[&Category::Test]);
    }

    #[tokio::test]
    async fn complex_query_shrinks_t2_threshold_like_a_new_user() {
        let d = detector();
        let (queries, cats) = empty_session();
        let complex_query = "analyze and investigate multiple complex interactions across \
                              several subsystems but also understand the overall design";
        let result = d
            .detect(
                complex_query,
                &Context::default(),
                SessionView {
                    recent_queries: &queries,
                    recent_categories: &cats,
                    is_new_user: false,
                },
            )
            .await;
        assert!(result.categories[&Category::Analysis]);
    }

    #[tokio::test]
    async fn categories_never_leak_outside_closed_set() {
        let d = detector();
        let (queries, cats) = empty_session();
        let result = d
            .detect(
                "perform security audit on the payment module",
                &Context {
                    has_security_files: true,
                    ..Default::default()
                },
                SessionView {
                    recent_queries: &queries,
                    recent_categories: &cats,
                    is_new_user: false,
                },
            )
            .await;
        assert_eq!(result.categories.len(), Category::ALL.len());
    }
}
