//! Loading Planner (spec.md §4.2): turns a `DetectionResult` + session
//! strategy + optional overrides into a concrete `LoadDecision`.

pub mod cache;
pub mod overrides;

use crate::catalog::{Catalog, CategoryMap, Tier, ToolId};
use crate::catalog::Category;
use crate::detector::DetectionResult;
pub use overrides::SessionOverrides;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Named knob set the planner modulates (spec.md §4.2, GLOSSARY "Strategy").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    Conservative,
    Balanced,
    Aggressive,
    UserControlled,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Balanced
    }
}

#[derive(Debug, Clone, Copy)]
struct StrategyKnobs {
    t2_mult: f64,
    t3_mult: f64,
    max_t2: usize,
    max_t3: usize,
}

impl Strategy {
    fn knobs(self) -> StrategyKnobs {
        match self {
            Strategy::Conservative => StrategyKnobs {
                t2_mult: 0.9,
                t3_mult: 0.9,
                max_t2: 1,
                max_t3: 1,
            },
            Strategy::Balanced => StrategyKnobs {
                t2_mult: 1.0,
                t3_mult: 1.0,
                max_t2: 1,
                max_t3: 1,
            },
            Strategy::Aggressive => StrategyKnobs {
                t2_mult: 1.05,
                t3_mult: 1.05,
                max_t2: 1,
                max_t3: 1,
            },
            // USER_CONTROLLED uses CONSERVATIVE's knobs; overrides are then
            // applied on top (spec.md §4.2 strategy table).
            Strategy::UserControlled => Strategy::Conservative.knobs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadDecision {
    pub tools: IndexSet<ToolId>,
    pub tier_breakdown: IndexMap<Tier, IndexSet<ToolId>>,
    pub estimated_tokens: u64,
    pub confidence_mean: f64,
    pub strategy: Strategy,
    pub fallback_reason: String,
    pub overrides_applied: Vec<String>,
}

impl LoadDecision {
    /// Planner failure decision (spec.md §4.2 "Planner failure"): T1 plus
    /// `analysis` and `debug` T2 categories, never empty-handed.
    fn fallback(category_map: &CategoryMap, catalog: &Catalog, reason: impl Into<String>) -> Self {
        let mut tools: IndexSet<ToolId> = category_map.core_tools();
        for category in [Category::Git, Category::Analysis, Category::Debug] {
            tools.extend(category_map.tools_in(category));
        }
        let tier_breakdown = partition_by_tier(&tools, category_map);
        let estimated_tokens = sum_tokens(&tools, catalog);
        Self {
            tools,
            tier_breakdown,
            estimated_tokens,
            confidence_mean: 0.5,
            strategy: Strategy::Conservative,
            fallback_reason: reason.into(),
            overrides_applied: Vec::new(),
        }
    }
}

fn partition_by_tier(tools: &IndexSet<ToolId>, category_map: &CategoryMap) -> IndexMap<Tier, IndexSet<ToolId>> {
    let mut breakdown: IndexMap<Tier, IndexSet<ToolId>> = IndexMap::new();
    for tier in [Tier::T1, Tier::T2, Tier::T3] {
        breakdown.insert(tier, IndexSet::new());
    }
    for tool in tools {
        // A tool absent from the category map (e.g. a core tool not yet
        // discovered by any Client) defaults to T1 — core tools are T1 by
        // definition (spec.md §3).
        let tier = category_map
            .category_of(tool)
            .map(Category::tier)
            .unwrap_or(Tier::T1);
        breakdown.entry(tier).or_default().insert(tool.clone());
    }
    breakdown
}

fn sum_tokens(tools: &IndexSet<ToolId>, catalog: &Catalog) -> u64 {
    tools
        .iter()
        .filter_map(|id| catalog.get(id))
        .map(|d| u64::from(d.token_cost))
        .sum()
}

/// Base thresholds the strategy multipliers scale (spec.md §4.2 scenarios
/// use `T2_thr=0.25`, `T3_thr=0.55` as the configured defaults).
#[derive(Debug, Clone, Copy)]
pub struct PlannerConfig {
    pub t2_threshold: f64,
    pub t3_threshold: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            t2_threshold: 0.25,
            t3_threshold: 0.55,
        }
    }
}

pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Produce a `LoadDecision`. Never fails the caller — any internal
    /// error degrades to `LoadDecision::fallback` (spec.md §7
    /// `PLANNING_FAILED` is always recovered locally).
    pub fn plan(
        &self,
        detection: &DetectionResult,
        strategy: Strategy,
        overrides: Option<&SessionOverrides>,
        category_map: &CategoryMap,
        catalog: &Catalog,
    ) -> LoadDecision {
        match self.select(detection, strategy, overrides, category_map, catalog) {
            Ok(decision) => decision,
            Err(reason) => {
                tracing::warn!(%reason, "planner failed, returning fallback decision");
                LoadDecision::fallback(category_map, catalog, reason)
            }
        }
    }

    fn select(
        &self,
        detection: &DetectionResult,
        strategy: Strategy,
        overrides: Option<&SessionOverrides>,
        category_map: &CategoryMap,
        catalog: &Catalog,
    ) -> Result<LoadDecision, String> {
        let knobs = strategy.knobs();
        let mut confidence = detection.confidence.clone();
        let mut overrides_applied = Vec::new();

        // Apply force/disable overrides, tracked for the decision summary
        // (spec.md §4.2 "User overrides").
        if let Some(overrides) = overrides {
            for category in &overrides.force_categories {
                confidence.insert(*category, 1.0);
                overrides_applied.push(format!("force:{category}"));
            }
            for category in &overrides.disable_categories {
                confidence.insert(*category, 0.0);
                overrides_applied.push(format!("disable:{category}"));
            }
        }
        let forced: IndexSet<Category> = overrides
            .map(|o| o.force_categories.clone())
            .unwrap_or_default();
        let disabled: IndexSet<Category> = overrides
            .map(|o| o.disable_categories.clone())
            .unwrap_or_default();

        let mut tools: IndexSet<ToolId> = category_map.core_tools();

        // T1 git: include iff confidence >= 0.3 after overrides.
        let git_confidence = confidence.get(&Category::Git).copied().unwrap_or(0.0);
        if git_confidence >= 0.3 && !disabled.contains(&Category::Git) {
            tools.extend(category_map.tools_in(Category::Git));
        }

        let t2_threshold = (self.config.t2_threshold * knobs.t2_mult).min(0.99);
        let t3_threshold = (self.config.t3_threshold * knobs.t3_mult).min(0.99);

        // Forced categories are guaranteed in, outside the `max_t2` cap —
        // otherwise a force could lose out to a higher-priority category
        // and get evicted, which would violate the monotone-override
        // invariant (forcing a category on must never remove a tool that
        // would have been present without the force).
        let mut t2_candidates: Vec<(Category, f64)> = Category::ALL
            .iter()
            .copied()
            .filter(|c| c.tier() == Tier::T2 && !disabled.contains(c) && !forced.contains(c))
            .filter_map(|c| {
                let score = confidence.get(&c).copied().unwrap_or(0.0);
                if score >= t2_threshold {
                    let mut priority = score;
                    if !category_map.tools_in(c).is_empty() {
                        priority += 0.5;
                    }
                    Some((c, priority))
                } else {
                    None
                }
            })
            .collect();
        t2_candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));
        for category in Category::ALL.iter().copied().filter(|c| c.tier() == Tier::T2 && forced.contains(c)) {
            tools.extend(category_map.tools_in(category));
        }
        for (category, _) in t2_candidates.into_iter().take(knobs.max_t2) {
            tools.extend(category_map.tools_in(category));
        }

        let mut t3_candidates: Vec<(Category, f64)> = Category::ALL
            .iter()
            .copied()
            .filter(|c| c.tier() == Tier::T3 && !disabled.contains(c) && !forced.contains(c))
            .filter_map(|c| {
                let score = confidence.get(&c).copied().unwrap_or(0.0);
                (score >= t3_threshold).then_some((c, score))
            })
            .collect();
        t3_candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));
        for category in Category::ALL.iter().copied().filter(|c| c.tier() == Tier::T3 && forced.contains(c)) {
            tools.extend(category_map.tools_in(category));
        }
        for (category, _) in t3_candidates.into_iter().take(knobs.max_t3) {
            tools.extend(category_map.tools_in(category));
        }

        // Dependency closure (spec.md §4.2 step 5).
        let mut frontier: Vec<ToolId> = tools.iter().cloned().collect();
        while let Some(id) = frontier.pop() {
            for dep in category_map.dependencies_of(&id) {
                if tools.insert(dep.clone()) {
                    frontier.push(dep);
                }
            }
        }

        let tier_breakdown = partition_by_tier(&tools, category_map);
        let estimated_tokens = sum_tokens(&tools, catalog);

        let observed: Vec<f64> = Category::ALL
            .iter()
            .filter_map(|c| confidence.get(c).copied().filter(|v| *v > 0.0))
            .collect();
        let confidence_mean = if observed.is_empty() {
            0.0
        } else {
            observed.iter().sum::<f64>() / observed.len() as f64
        };

        Ok(LoadDecision {
            tools,
            tier_breakdown,
            estimated_tokens,
            confidence_mean,
            strategy,
            fallback_reason: String::new(),
            overrides_applied,
        })
    }
}

/// Enforce `HUB_MAX_TOOLS` (spec.md §8 "Cap" invariant): never trims below
/// `core_tools`, even if that alone exceeds the cap.
pub fn apply_cap(mut decision: LoadDecision, max_tools: usize, category_map: &CategoryMap) -> LoadDecision {
    let core = category_map.core_tools();
    if decision.tools.len() <= max_tools {
        return decision;
    }
    if core.len() >= max_tools {
        decision.tools = core.clone();
    } else {
        // Keep core tools, then the highest-priority remainder in existing
        // (deterministic) iteration order until the cap is reached.
        let mut capped: IndexSet<ToolId> = core.clone();
        for tool in &decision.tools {
            if capped.len() >= max_tools {
                break;
            }
            capped.insert(tool.clone());
        }
        decision.tools = capped;
    }
    decision.tier_breakdown = partition_by_tier(&decision.tools, category_map);
    decision
}
