//! Property tests for the planner invariants from spec.md §8 "Invariants".

use indexmap::{IndexMap, IndexSet};
use proptest::prelude::*;
use toolhub::catalog::{tool_id, Catalog, Category, CategoryMap, Tier, ToolDescriptor};
use toolhub::detector::{DetectionResult, FallbackTag};
use toolhub::planner::{apply_cap, Planner, PlannerConfig, SessionOverrides, Strategy as LoadStrategy};

/// Builds a catalog with a handful of tools per non-core category, so the
/// planner has real selection pressure to apply its caps and rankings to.
fn fixture() -> (CategoryMap, Catalog) {
    let mut category_map = CategoryMap::new();
    let mut catalog = Catalog::new();
    let defs = [
        ("core", "read_file", Category::Core, true),
        ("core", "write_file", Category::Core, true),
        ("git", "status", Category::Git, false),
        ("git", "commit", Category::Git, false),
        ("analysis", "explain", Category::Analysis, false),
        ("analysis", "trace_deps", Category::Analysis, false),
        ("quality", "lint", Category::Quality, false),
        ("debug", "trace", Category::Debug, false),
        ("test", "run_tests", Category::Test, false),
        ("security", "scan", Category::Security, false),
        ("external", "web_search", Category::External, false),
        ("infra", "deploy", Category::Infrastructure, false),
    ];
    for (server, name, category, is_core) in defs {
        let id = tool_id(server, name);
        category_map.insert(id.clone(), category, is_core);
        catalog.insert(ToolDescriptor {
            id,
            description: format!("{server} {name}"),
            owning_server_id: server.into(),
            input_schema: serde_json::json!({}),
            category,
            tier: category.tier(),
            token_cost: 25,
            priority: 0,
        });
    }
    (category_map, catalog)
}

fn detection_with(confidence: [f64; 9]) -> DetectionResult {
    let mut categories = IndexMap::new();
    let mut confidence_map = IndexMap::new();
    for (c, score) in Category::ALL.into_iter().zip(confidence) {
        confidence_map.insert(c, score);
        categories.insert(c, c.tier() == Tier::T1 || score >= 0.25);
    }
    DetectionResult {
        categories,
        confidence: confidence_map,
        signals: IndexMap::new(),
        fallback_tag: FallbackTag::None,
        detection_ms: 0,
    }
}

fn arb_confidence() -> impl Strategy<Value = [f64; 9]> {
    proptest::array::uniform9(0.0f64..=1.0f64)
}

fn arb_strategy() -> impl Strategy<Value = LoadStrategy> {
    prop_oneof![
        Just(LoadStrategy::Conservative),
        Just(LoadStrategy::Balanced),
        Just(LoadStrategy::Aggressive),
        Just(LoadStrategy::UserControlled),
    ]
}

proptest! {
    /// Catalog closure: every tool in a decision was either registered as
    /// core or came from a category the fixture catalog actually carries.
    #[test]
    fn catalog_closure(confidence in arb_confidence(), strategy in arb_strategy()) {
        let (category_map, catalog) = fixture();
        let detection = detection_with(confidence);
        let decision = Planner::new(PlannerConfig::default())
            .plan(&detection, strategy, None, &category_map, &catalog);
        for tool in &decision.tools {
            prop_assert!(
                category_map.is_core(tool) || category_map.category_of(tool).is_some(),
                "tool {tool} not in core set or any known category"
            );
        }
    }

    /// Tier partition: tier_breakdown buckets union back to exactly `tools`,
    /// with no overlap between buckets.
    #[test]
    fn tier_partition(confidence in arb_confidence(), strategy in arb_strategy()) {
        let (category_map, catalog) = fixture();
        let detection = detection_with(confidence);
        let decision = Planner::new(PlannerConfig::default())
            .plan(&detection, strategy, None, &category_map, &catalog);

        let mut seen = IndexSet::new();
        let mut union: IndexSet<_> = IndexSet::new();
        for (tier, tools) in &decision.tier_breakdown {
            for tool in tools {
                prop_assert!(seen.insert(tool.clone()), "tool {tool} appears in more than one tier bucket ({tier:?})");
                union.insert(tool.clone());
            }
        }
        prop_assert_eq!(union, decision.tools.iter().cloned().collect::<IndexSet<_>>());
    }

    /// Core presence: core tools are present in every non-error decision,
    /// regardless of confidence or strategy.
    #[test]
    fn core_presence(confidence in arb_confidence(), strategy in arb_strategy()) {
        let (category_map, catalog) = fixture();
        let detection = detection_with(confidence);
        let decision = Planner::new(PlannerConfig::default())
            .plan(&detection, strategy, None, &category_map, &catalog);
        for core_tool in category_map.core_tools() {
            prop_assert!(decision.tools.contains(&core_tool));
        }
    }

    /// Monotone override: forcing a category on never removes a tool that
    /// would have been present without the force.
    #[test]
    fn monotone_override(confidence in arb_confidence(), strategy in arb_strategy()) {
        let (category_map, catalog) = fixture();
        let detection = detection_with(confidence);
        let planner = Planner::new(PlannerConfig::default());

        let without = planner.plan(&detection, strategy, None, &category_map, &catalog);

        let mut overrides = SessionOverrides::default();
        overrides.force(Category::Debug);
        let with = planner.plan(&detection, strategy, Some(&overrides), &category_map, &catalog);

        for tool in &without.tools {
            prop_assert!(with.tools.contains(tool), "forcing a category dropped {tool}");
        }
    }

    /// Cap: a capped decision never exceeds max_tools, unless core tools
    /// alone already exceed it, in which case the decision degrades to
    /// exactly the core set.
    #[test]
    fn cap_respects_bound(
        confidence in arb_confidence(),
        strategy in arb_strategy(),
        max_tools in 1usize..12,
    ) {
        let (category_map, catalog) = fixture();
        let detection = detection_with(confidence);
        let decision = Planner::new(PlannerConfig::default())
            .plan(&detection, strategy, None, &category_map, &catalog);
        let capped = apply_cap(decision, max_tools, &category_map);

        let core = category_map.core_tools();
        if core.len() >= max_tools {
            prop_assert_eq!(capped.tools, core);
        } else {
            prop_assert!(capped.tools.len() <= max_tools);
        }
    }

    /// Determinism: the same detection + strategy + overrides always plans
    /// to the same decision (tool set and tier breakdown).
    #[test]
    fn determinism(confidence in arb_confidence(), strategy in arb_strategy()) {
        let (category_map, catalog) = fixture();
        let detection = detection_with(confidence);
        let planner = Planner::new(PlannerConfig::default());

        let first = planner.plan(&detection, strategy, None, &category_map, &catalog);
        let second = planner.plan(&detection, strategy, None, &category_map, &catalog);

        prop_assert_eq!(first.tools, second.tools);
        prop_assert_eq!(first.tier_breakdown, second.tier_breakdown);
        prop_assert_eq!(first.estimated_tokens, second.estimated_tokens);
    }
}
