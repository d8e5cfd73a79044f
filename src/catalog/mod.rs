//! Static data: category → tool-ID membership, tier assignment, tool
//! priority, and the aggregated tool catalog discovered from Clients.
//!
//! Everything here is configuration-as-value (spec.md §9): loaded once at
//! startup, immutable thereafter, and passed into the Detector/Planner as
//! plain data so both stay unit-testable without touching a filesystem.

pub mod keywords;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of task categories (spec.md §3). Order here is the
/// canonical iteration order used everywhere a category map is walked,
/// which keeps tie-breaking in the Planner deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Core,
    Git,
    Analysis,
    Quality,
    Debug,
    Test,
    Security,
    External,
    Infrastructure,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Core,
        Category::Git,
        Category::Analysis,
        Category::Quality,
        Category::Debug,
        Category::Test,
        Category::Security,
        Category::External,
        Category::Infrastructure,
    ];

    pub fn tier(self) -> Tier {
        match self {
            Category::Core | Category::Git => Tier::T1,
            Category::Analysis
            | Category::Quality
            | Category::Debug
            | Category::Test
            | Category::Security => Tier::T2,
            Category::External | Category::Infrastructure => Tier::T3,
        }
    }

    /// Parse one of the closed-set names, case-insensitively. Used when
    /// loading `CatalogConfig.category_overrides` and when parsing
    /// `/load-<cat>` style session commands.
    pub fn parse(s: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.as_str().eq_ignore_ascii_case(s))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Core => "core",
            Category::Git => "git",
            Category::Analysis => "analysis",
            Category::Quality => "quality",
            Category::Debug => "debug",
            Category::Test => "test",
            Category::Security => "security",
            Category::External => "external",
            Category::Infrastructure => "infrastructure",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse load-priority band (spec.md §3/§GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    T1,
    T2,
    T3,
}

/// Stable identifier for a tool, `<server>__<local_name>` by convention.
pub type ToolId = String;

pub fn tool_id(server: &str, local_name: &str) -> ToolId {
    format!("{server}__{local_name}")
}

/// Immutable once discovered (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub id: ToolId,
    pub description: String,
    pub owning_server_id: String,
    pub input_schema: serde_json::Value,
    pub category: Category,
    pub tier: Tier,
    pub token_cost: u32,
    pub priority: i32,
}

/// A tool-ID's static membership data, independent of whether the tool has
/// actually been discovered yet (a core tool may be listed here before any
/// Client ever reports it — see the core-tools invariant in spec.md §3).
#[derive(Debug, Clone)]
pub struct CategoryEntry {
    pub category: Category,
    /// Essential T1 tools that are always exposed, even absent a live Client.
    pub is_core: bool,
}

/// Static category → tool-ID map plus tier/priority bookkeeping, loaded
/// once at startup (see `config::schema::CatalogConfig`).
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    entries: IndexMap<ToolId, CategoryEntry>,
    /// Per-category declared tool-level dependencies, resolved transitively
    /// by the Planner (spec.md §4.2 step 5).
    dependencies: IndexMap<ToolId, IndexSet<ToolId>>,
}

impl CategoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ToolId, category: Category, is_core: bool) {
        self.entries.insert(id, CategoryEntry { category, is_core });
    }

    pub fn set_dependencies(&mut self, id: ToolId, deps: impl IntoIterator<Item = ToolId>) {
        self.dependencies.insert(id, deps.into_iter().collect());
    }

    pub fn category_of(&self, id: &str) -> Option<Category> {
        self.entries.get(id).map(|e| e.category)
    }

    pub fn is_core(&self, id: &str) -> bool {
        self.entries.get(id).map(|e| e.is_core).unwrap_or(false)
    }

    /// All statically known core-tool IDs (present regardless of Client state).
    pub fn core_tools(&self) -> IndexSet<ToolId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.is_core)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Tool IDs belonging to `category`, in insertion order.
    pub fn tools_in(&self, category: Category) -> Vec<ToolId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.category == category)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn dependencies_of(&self, id: &str) -> IndexSet<ToolId> {
        self.dependencies.get(id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The aggregated tool catalog: union of every Client's discovered
/// descriptors plus the statically-declared core tools. Read-mostly;
/// mutated only at discovery time (spec.md §3 "Lifecycles").
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tools: IndexMap<ToolId, ToolDescriptor>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, descriptor: ToolDescriptor) {
        self.tools.insert(descriptor.id.clone(), descriptor);
    }

    pub fn get(&self, id: &str) -> Option<&ToolDescriptor> {
        self.tools.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tools.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Sum of `token_cost` across every registered descriptor — the
    /// `tokens_baseline` used by `EndSession`'s reduction metric.
    pub fn total_token_cost(&self) -> u64 {
        self.tools.values().map(|t| u64::from(t.token_cost)).sum()
    }

    /// Remove every descriptor owned by `server_id` (used on Client rediscovery).
    pub fn remove_server(&mut self, server_id: &str) {
        self.tools.retain(|_, t| t.owning_server_id != server_id);
    }
}
