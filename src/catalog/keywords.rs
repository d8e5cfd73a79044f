//! Keyword tables, context/environment credit tables, and calibration
//! curves for the Task Detector (spec.md §4.1). All of this is data, not
//! logic — `DetectorConfig::default()` is the compiled-in table; callers
//! may override individual categories via the config file for tests or
//! tuning without touching `detector::*`.

use crate::catalog::Category;
use indexmap::IndexMap;

/// Direct / contextual / action keyword sets for one category, with the
/// category's base confidence weight (spec.md §4.1.1).
#[derive(Debug, Clone)]
pub struct KeywordSet {
    pub base_confidence: f64,
    pub direct: Vec<&'static str>,
    pub contextual: Vec<&'static str>,
    pub action: Vec<&'static str>,
}

impl KeywordSet {
    /// Weight applied to a match of each kind (spec.md §4.1.1).
    pub const DIRECT_WEIGHT: f64 = 1.0;
    pub const CONTEXTUAL_WEIGHT: f64 = 0.7;
    pub const ACTION_WEIGHT: f64 = 0.5;
}

/// A monotonic non-decreasing piecewise-linear calibration curve
/// (spec.md §4.1 "Calibrator"). Anchors are `(raw_score, calibrated_score)`
/// pairs sorted by `raw_score`.
#[derive(Debug, Clone)]
pub struct CalibrationCurve {
    anchors: Vec<(f64, f64)>,
}

impl CalibrationCurve {
    pub fn new(anchors: Vec<(f64, f64)>) -> Self {
        debug_assert!(anchors.len() >= 2, "a curve needs at least two anchors");
        debug_assert!(
            anchors.windows(2).all(|w| w[0].0 <= w[1].0),
            "anchors must be sorted by raw_score"
        );
        debug_assert!(
            anchors.windows(2).all(|w| w[0].1 <= w[1].1),
            "calibration curves must be monotonic non-decreasing"
        );
        Self { anchors }
    }

    /// Interpolate `raw` linearly between the two bracketing anchors;
    /// extrapolate past either end using the nearest segment's slope.
    pub fn apply(&self, raw: f64) -> f64 {
        let anchors = &self.anchors;
        if raw <= anchors[0].0 {
            let (x0, y0) = anchors[0];
            let (x1, y1) = anchors[1];
            return extrapolate(raw, x0, y0, x1, y1);
        }
        let last = anchors.len() - 1;
        if raw >= anchors[last].0 {
            let (x0, y0) = anchors[last - 1];
            let (x1, y1) = anchors[last];
            return extrapolate(raw, x0, y0, x1, y1);
        }
        for w in anchors.windows(2) {
            let (x0, y0) = w[0];
            let (x1, y1) = w[1];
            if raw >= x0 && raw <= x1 {
                if (x1 - x0).abs() < f64::EPSILON {
                    return y0;
                }
                let t = (raw - x0) / (x1 - x0);
                return y0 + t * (y1 - y0);
            }
        }
        unreachable!("raw is within [anchors[0].0, anchors[last].0] by the checks above")
    }
}

fn extrapolate(x: f64, x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
    if (x1 - x0).abs() < f64::EPSILON {
        return y0;
    }
    let slope = (y1 - y0) / (x1 - x0);
    (y0 + slope * (x - x0)).clamp(0.0, 1.0)
}

/// Fixed credits contributed by the context analyzer (spec.md §4.1.2).
#[derive(Debug, Clone)]
pub struct ContextRules {
    pub error_substrings: Vec<&'static str>,
    pub error_credit: f64,
    pub error_categories: Vec<Category>,
    pub performance_tokens: Vec<&'static str>,
    pub performance_credit: f64,
    pub performance_categories: Vec<Category>,
    pub file_extension_credit: f64,
    pub file_extension_categories: Vec<Category>,
}

/// Fixed increments contributed by the environment analyzer (spec.md §4.1.3).
/// Each field is `(increment, categories boosted)`.
#[derive(Debug, Clone)]
pub struct EnvironmentRules {
    pub has_uncommitted_changes: (f64, Vec<Category>),
    pub has_merge_conflicts: (f64, Vec<Category>),
    pub recent_commits: (f64, Vec<Category>),
    pub has_test_directories: (f64, Vec<Category>),
    pub has_security_files: (f64, Vec<Category>),
    pub has_ci_files: (f64, Vec<Category>),
    pub has_docs: (f64, Vec<Category>),
}

/// Tokens that count toward the complexity modifier (spec.md §4.1 "Calibrator").
pub const COMPLEXITY_TOKENS: &[&str] = &[
    "and",
    "or",
    "but",
    "also",
    "multiple",
    "complex",
    "analyze",
    "investigate",
    "understand",
    "across",
    "several",
    "refactor",
];

/// All per-signal/per-category configuration the Detector needs, assembled
/// once at startup (spec.md §9 "configuration as value").
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub keywords: IndexMap<Category, KeywordSet>,
    pub calibration: IndexMap<Category, CalibrationCurve>,
    pub context_rules: ContextRules,
    pub environment_rules: EnvironmentRules,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let mut keywords = IndexMap::new();
        keywords.insert(
            Category::Core,
            KeywordSet {
                base_confidence: 0.9,
                direct: vec!["read file", "write file", "list directory", "edit"],
                contextual: vec!["file", "directory", "path"],
                action: vec!["open", "save"],
            },
        );
        keywords.insert(
            Category::Git,
            KeywordSet {
                base_confidence: 0.9,
                direct: vec!["git", "commit", "push", "pull request", "branch", "merge"],
                contextual: vec!["remote", "repository", "diff", "stash"],
                action: vec!["checkout", "rebase", "clone"],
            },
        );
        keywords.insert(
            Category::Analysis,
            KeywordSet {
                base_confidence: 0.6,
                direct: vec!["analyze", "architecture", "explain the codebase", "understand"],
                contextual: vec!["codebase", "structure", "dependency graph", "design"],
                action: vec!["review", "summarize", "trace"],
            },
        );
        keywords.insert(
            Category::Quality,
            KeywordSet {
                base_confidence: 0.55,
                direct: vec!["lint", "format", "code quality", "refactor"],
                contextual: vec!["style guide", "clippy", "complexity"],
                action: vec!["clean up", "simplify"],
            },
        );
        keywords.insert(
            Category::Debug,
            KeywordSet {
                base_confidence: 0.6,
                direct: vec!["debug", "failing", "bug", "crash", "stack trace"],
                contextual: vec!["exception", "traceback", "breakpoint"],
                action: vec!["reproduce", "diagnose", "step through"],
            },
        );
        keywords.insert(
            Category::Test,
            KeywordSet {
                base_confidence: 0.6,
                direct: vec!["test", "unit test", "integration test", "coverage"],
                contextual: vec!["assertion", "fixture", "mock"],
                action: vec!["run tests", "write a test"],
            },
        );
        keywords.insert(
            Category::Security,
            KeywordSet {
                base_confidence: 0.65,
                direct: vec!["security", "vulnerability", "audit", "cve", "exploit"],
                contextual: vec!["authentication", "authorization", "secret", "payment"],
                action: vec!["sanitize", "harden"],
            },
        );
        keywords.insert(
            Category::External,
            KeywordSet {
                base_confidence: 0.5,
                direct: vec!["api call", "webhook", "third-party", "external service"],
                contextual: vec!["integration", "oauth", "rate limit"],
                action: vec!["call the api", "fetch from"],
            },
        );
        keywords.insert(
            Category::Infrastructure,
            KeywordSet {
                base_confidence: 0.5,
                direct: vec!["deploy", "kubernetes", "docker", "infrastructure", "terraform"],
                contextual: vec!["cluster", "container", "pipeline"],
                action: vec!["provision", "scale"],
            },
        );

        let mut calibration = IndexMap::new();
        for category in Category::ALL {
            // Default curve: mild compression in the mid-range, identity elsewhere.
            // T1 categories get a gentler curve since they're always-on anyway.
            let anchors = match category.tier() {
                crate::catalog::Tier::T1 => vec![(0.0, 0.0), (1.0, 1.0)],
                crate::catalog::Tier::T2 => {
                    vec![(0.0, 0.0), (0.3, 0.25), (0.6, 0.55), (1.0, 1.0)]
                }
                crate::catalog::Tier::T3 => {
                    vec![(0.0, 0.0), (0.5, 0.35), (0.8, 0.7), (1.0, 1.0)]
                }
            };
            calibration.insert(category, CalibrationCurve::new(anchors));
        }

        let context_rules = ContextRules {
            error_substrings: vec![
                "traceback",
                "exception",
                "failed",
                "error:",
                "warning:",
                "500",
                "502",
                "503",
                "timeout",
            ],
            error_credit: 0.5,
            error_categories: vec![Category::Debug, Category::Test],
            performance_tokens: vec!["slow", "memory", "performance", "optimization", "bottleneck"],
            performance_credit: 0.4,
            performance_categories: vec![Category::Analysis, Category::Quality],
            file_extension_credit: 0.4,
            file_extension_categories: vec![Category::Quality],
        };

        let environment_rules = EnvironmentRules {
            has_uncommitted_changes: (0.3, vec![Category::Git]),
            has_merge_conflicts: (0.5, vec![Category::Git]),
            recent_commits: (0.2, vec![Category::Git, Category::Analysis]),
            has_test_directories: (0.3, vec![Category::Test]),
            has_security_files: (0.4, vec![Category::Security]),
            has_ci_files: (0.3, vec![Category::Infrastructure]),
            has_docs: (0.2, vec![Category::Analysis]),
        };

        Self {
            keywords,
            calibration,
            context_rules,
            environment_rules,
        }
    }
}
