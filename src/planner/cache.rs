//! Bounded, TTL-evicted decision cache (spec.md §4.2 "Caching", §9 "Cache
//! keys"). Same shape as `oxicrab`'s tool-result cache middleware: an
//! `lru::LruCache` with `Instant`-stamped entries, checked for staleness on
//! read rather than swept eagerly.

use super::{LoadDecision, Strategy};
use crate::catalog::Category;
use lru::LruCache;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use std::collections::hash_map::DefaultHasher;

const DEFAULT_CAPACITY: usize = 512;

struct Entry {
    decision: LoadDecision,
    cached_at: Instant,
}

pub struct DecisionCache {
    inner: std::sync::Mutex<LruCache<u64, Entry>>,
    ttl: Duration,
}

impl DecisionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: std::sync::Mutex::new(LruCache::new(
                NonZeroUsize::new(DEFAULT_CAPACITY).unwrap(),
            )),
            ttl,
        }
    }

    pub fn get(&self, key: u64) -> Option<LoadDecision> {
        let mut guard = self.inner.lock().unwrap();
        if let Some(entry) = guard.get(&key) {
            if entry.cached_at.elapsed() < self.ttl {
                return Some(entry.decision.clone());
            }
            guard.pop(&key);
        }
        None
    }

    pub fn insert(&self, key: u64, decision: LoadDecision) {
        let mut guard = self.inner.lock().unwrap();
        guard.put(
            key,
            Entry {
                decision,
                cached_at: Instant::now(),
            },
        );
    }
}

/// `hash(normalized_query, strategy, override-set)` (spec.md §9). Category
/// sets are sorted before hashing so insertion order never affects the key.
pub fn cache_key(
    normalized_query: &str,
    strategy: Strategy,
    force: &[Category],
    disable: &[Category],
) -> u64 {
    let mut hasher = DefaultHasher::new();
    normalized_query.hash(&mut hasher);
    format!("{strategy:?}").hash(&mut hasher);
    let mut force_sorted = force.to_vec();
    force_sorted.sort();
    force_sorted.hash(&mut hasher);
    let mut disable_sorted = disable.to_vec();
    disable_sorted.sort();
    disable_sorted.hash(&mut hasher);
    hasher.finish()
}
