//! Session Manager (spec.md §4.4, §3 `Session`): per-conversation state
//! tracked purely in memory (no persistence across restarts) with idle-TTL
//! reaping in the manner of `oxicrab::session::manager::SessionManager`'s
//! `LruCache`-backed store, minus the disk-backed `SessionStore`.

pub mod cache;

use crate::catalog::Category;
use crate::planner::{SessionOverrides, Strategy};
use indexmap::IndexMap;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::time::Instant;
use uuid::Uuid;

const MAX_CACHED_SESSIONS: usize = 512;
const HISTORY_WINDOW: usize = 10;

/// One logical agent conversation's detection/loading history entry
/// (spec.md §3 `Session.history`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub query: String,
    pub categories: IndexMap<Category, bool>,
    pub tools_used: Vec<String>,
}

/// Running counters surfaced by `hub_status`/`EndSession` (spec.md §3
/// `Session.metrics`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub detections: u64,
    pub fallbacks: u64,
    pub errors: u64,
    pub tokens_loaded: u64,
    pub tokens_baseline: u64,
}

impl SessionMetrics {
    /// `1 − tokens_loaded/tokens_baseline` (spec.md §4.4 `EndSession`).
    pub fn token_reduction(&self) -> f64 {
        if self.tokens_baseline == 0 {
            return 0.0;
        }
        1.0 - (self.tokens_loaded as f64 / self.tokens_baseline as f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub strategy: Strategy,
    history: VecDeque<HistoryEntry>,
    pub overrides: SessionOverrides,
    pub metrics: SessionMetrics,
    #[serde(skip, default = "Instant::now")]
    last_touched: Instant,
}

impl Session {
    fn new(id: Uuid, user_id: String) -> Self {
        Self {
            id,
            user_id,
            strategy: Strategy::default(),
            history: VecDeque::with_capacity(HISTORY_WINDOW),
            overrides: SessionOverrides::default(),
            metrics: SessionMetrics::default(),
            last_touched: Instant::now(),
        }
    }

    /// Append one query/decision to the bounded ring buffer (spec.md §3
    /// "bounded ring buffer of the last k queries").
    pub fn push_history(&mut self, entry: HistoryEntry) {
        if self.history.len() == HISTORY_WINDOW {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }

    pub fn recent_queries(&self) -> Vec<String> {
        self.history.iter().map(|e| e.query.clone()).collect()
    }

    pub fn recent_categories(&self) -> Vec<IndexMap<Category, bool>> {
        self.history.iter().map(|e| e.categories.clone()).collect()
    }

    pub fn is_new_user(&self) -> bool {
        self.history.is_empty()
    }

    pub fn record_tool_use(&mut self, tool_id: &str) {
        if let Some(last) = self.history.back_mut() {
            last.tools_used.push(tool_id.to_string());
        }
    }

    fn touch(&mut self) {
        self.last_touched = Instant::now();
    }
}

/// In-memory, LRU-bounded, idle-TTL-reaped session table (spec.md §4.4,
/// Non-goal "no persistence of sessions across process restarts"). Unlike
/// the teacher's `SessionManager`, there is no `SessionStore`/disk-backed
/// JSONL log: the whole table lives in the `LruCache`, recorded as an
/// intentional divergence.
pub struct SessionManager {
    cache: tokio::sync::Mutex<LruCache<Uuid, Session>>,
    idle_ttl: std::time::Duration,
}

impl SessionManager {
    pub fn new(idle_ttl: std::time::Duration) -> Self {
        Self {
            cache: tokio::sync::Mutex::new(LruCache::new(
                NonZeroUsize::new(MAX_CACHED_SESSIONS).expect("MAX_CACHED_SESSIONS must be > 0"),
            )),
            idle_ttl,
        }
    }

    /// Find-or-create (spec.md §4.4 "Sessions created on first ListTools").
    pub async fn find_or_create(&self, session_id: Uuid, user_id: &str) -> Session {
        let mut guard = self.cache.lock().await;
        if let Some(session) = guard.get_mut(&session_id) {
            session.touch();
            return session.clone();
        }
        let session = Session::new(session_id, user_id.to_string());
        guard.put(session_id, session.clone());
        session
    }

    /// Apply a mutation to a session under its own lock so a session
    /// cannot interleave its own re-plans with itself (spec.md §5
    /// "Shared resources").
    pub async fn with_session<R>(&self, session_id: Uuid, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut guard = self.cache.lock().await;
        let session = guard.get_mut(&session_id)?;
        session.touch();
        Some(f(session))
    }

    /// Retire a session explicitly (spec.md §4.4 `EndSession`), returning
    /// its final state for the summary.
    pub async fn end(&self, session_id: Uuid) -> Option<Session> {
        self.cache.lock().await.pop(&session_id)
    }

    /// Sweep sessions idle past the TTL (spec.md §4.4 "retired after an
    /// idle TTL"). Meant to run on a background interval from `hub.rs`.
    pub async fn reap_idle(&self) -> usize {
        let mut guard = self.cache.lock().await;
        let stale: Vec<Uuid> = guard
            .iter()
            .filter(|(_, s)| s.last_touched.elapsed() >= self.idle_ttl)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            guard.pop(id);
        }
        stale.len()
    }

    pub async fn active_count(&self) -> usize {
        self.cache.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn find_or_create_is_idempotent() {
        let manager = SessionManager::new(Duration::from_secs(60));
        let id = Uuid::new_v4();
        let first = manager.find_or_create(id, "alice").await;
        manager
            .with_session(id, |s| s.strategy = Strategy::Aggressive)
            .await;
        let second = manager.find_or_create(id, "alice").await;
        assert_eq!(second.strategy, Strategy::Aggressive);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn history_ring_buffer_is_bounded() {
        let manager = SessionManager::new(Duration::from_secs(60));
        let id = Uuid::new_v4();
        manager.find_or_create(id, "alice").await;
        for i in 0..(HISTORY_WINDOW + 5) {
            manager
                .with_session(id, |s| {
                    s.push_history(HistoryEntry {
                        query: format!("query {i}"),
                        categories: IndexMap::new(),
                        tools_used: Vec::new(),
                    })
                })
                .await;
        }
        let session = manager.find_or_create(id, "alice").await;
        assert_eq!(session.history.len(), HISTORY_WINDOW);
        assert_eq!(session.history.front().unwrap().query, "query 5");
    }

    #[tokio::test]
    async fn end_session_removes_it_and_returns_final_state() {
        let manager = SessionManager::new(Duration::from_secs(60));
        let id = Uuid::new_v4();
        manager.find_or_create(id, "alice").await;
        let ended = manager.end(id).await;
        assert!(ended.is_some());
        assert_eq!(manager.active_count().await, 0);
    }

    #[tokio::test]
    async fn reap_idle_drops_stale_sessions() {
        let manager = SessionManager::new(Duration::from_millis(1));
        let id = Uuid::new_v4();
        manager.find_or_create(id, "alice").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let reaped = manager.reap_idle().await;
        assert_eq!(reaped, 1);
        assert_eq!(manager.active_count().await, 0);
    }

    #[test]
    fn token_reduction_is_computed_correctly() {
        let metrics = SessionMetrics {
            tokens_loaded: 300,
            tokens_baseline: 1000,
            ..Default::default()
        };
        assert!((metrics.token_reduction() - 0.7).abs() < 1e-9);
    }
}
