//! Detection-result cache (spec.md §3 "caches detection results", default
//! TTL 1h). Same shape as `planner::cache::DecisionCache`: an
//! `lru::LruCache` with staleness checked on read.

use crate::detector::{Context, DetectionResult};
use lru::LruCache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

struct Entry {
    result: DetectionResult,
    cached_at: Instant,
}

pub struct DetectionCache {
    inner: std::sync::Mutex<LruCache<u64, Entry>>,
    ttl: Duration,
}

impl DetectionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: std::sync::Mutex::new(LruCache::new(
                NonZeroUsize::new(DEFAULT_CAPACITY).unwrap(),
            )),
            ttl,
        }
    }

    pub fn get(&self, key: u64) -> Option<DetectionResult> {
        let mut guard = self.inner.lock().unwrap();
        if let Some(entry) = guard.get(&key) {
            if entry.cached_at.elapsed() < self.ttl {
                return Some(entry.result.clone());
            }
            guard.pop(&key);
        }
        None
    }

    pub fn insert(&self, key: u64, result: DetectionResult) {
        let mut guard = self.inner.lock().unwrap();
        guard.put(
            key,
            Entry {
                result,
                cached_at: Instant::now(),
            },
        );
    }
}

/// `hash(normalized_query, context_digest)` (spec.md §3). The context
/// digest is a structural hash of `Context` via its serialized form so two
/// equivalent contexts always collapse to the same key.
pub fn cache_key(normalized_query: &str, context: &Context) -> u64 {
    let mut hasher = DefaultHasher::new();
    normalized_query.hash(&mut hasher);
    let digest = serde_json::to_string(context).unwrap_or_default();
    digest.hash(&mut hasher);
    hasher.finish()
}
