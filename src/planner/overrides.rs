//! Sticky per-session overrides (spec.md §3 `Session.overrides`, §4.2 "User
//! overrides").

use crate::catalog::Category;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::Strategy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionOverrides {
    pub force_categories: IndexSet<Category>,
    pub disable_categories: IndexSet<Category>,
}

impl SessionOverrides {
    pub fn force(&mut self, category: Category) {
        self.disable_categories.shift_remove(&category);
        self.force_categories.insert(category);
    }

    pub fn disable(&mut self, category: Category) {
        self.force_categories.shift_remove(&category);
        self.disable_categories.insert(category);
    }

    pub fn clear(&mut self, category: Category) {
        self.force_categories.shift_remove(&category);
        self.disable_categories.shift_remove(&category);
    }
}

/// A strategy override lives alongside category overrides but is applied
/// by swapping the whole knob row rather than mutating confidence
/// (spec.md §4.2 "Strategy override swaps the knob row").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyOverride(pub Option<Strategy>);
