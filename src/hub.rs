//! Front Door (spec.md §4.4): the library-embeddable API gluing the
//! Session Manager, Task Detector, Loading Planner and Router together.
//! One struct owns an `Arc` to each subsystem; no subsystem references the
//! Hub or a Session back (spec.md §9 "avoid cyclic ownership"), the same
//! shape as `oxicrab::agent::loop::AgentLoop` being built once from an
//! explicit context struct.

use crate::catalog::{Catalog, CategoryMap, Category, ToolDescriptor, ToolId, tool_id};
use crate::client::{Client, ClientState, Router};
use crate::config::Config;
use crate::detector::{Context, Detector, SessionView};
use crate::errors::HubError;
use crate::planner::cache::{cache_key, DecisionCache};
use crate::planner::{apply_cap, LoadDecision, Planner, PlannerConfig, SessionOverrides, Strategy};
use crate::session::cache::{cache_key as detection_cache_key, DetectionCache};
use crate::session::{HistoryEntry, SessionManager};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Response to `ListTools`: the materialized descriptor list plus the
/// decision that produced it (spec.md §4.4).
#[derive(Debug, Clone)]
pub struct ListToolsResponse {
    pub tools: Vec<ToolDescriptor>,
    pub decision: LoadDecision,
}

/// Response to `EndSession` (spec.md §4.4).
#[derive(Debug, Clone)]
pub struct EndSessionSummary {
    pub session_id: Uuid,
    pub token_reduction: f64,
    pub metrics: crate::session::SessionMetrics,
}

/// Response to `hub_status` (SPEC_FULL.md §4.4, supplemented from
/// `original_source/hub_server.py`'s operator status surface).
#[derive(Debug, Clone)]
pub struct HubStatus {
    pub ready_clients: usize,
    pub failed_clients: usize,
    pub catalog_size: usize,
    pub active_sessions: usize,
    pub cumulative_token_reduction: f64,
}

pub struct Hub {
    config: Config,
    catalog: tokio::sync::RwLock<Catalog>,
    category_map: tokio::sync::RwLock<CategoryMap>,
    detector: Detector,
    planner: Planner,
    router: Router,
    sessions: SessionManager,
    detection_cache: DetectionCache,
    decision_cache: DecisionCache,
    ended_sessions: AtomicU64,
    cumulative_reduction_sum: std::sync::Mutex<f64>,
}

impl Hub {
    pub fn new(config: Config, detector: Detector) -> Self {
        let mut clients = HashMap::new();
        for (name, client_config) in &config.clients {
            if client_config.enabled {
                clients.insert(
                    name.clone(),
                    Arc::new(Client::new(client_config, config.pending_request_bound)),
                );
            }
        }
        let router = Router::new(clients);
        let session_idle_ttl = Duration::from_secs(config.session_idle_ttl_sec);
        let detection_cache_ttl = Duration::from_secs(config.detection_cache_ttl_sec);
        let decision_cache_ttl = Duration::from_secs(config.decision_cache_ttl_sec);

        Self {
            planner: Planner::new(PlannerConfig::default()),
            sessions: SessionManager::new(session_idle_ttl),
            detection_cache: DetectionCache::new(detection_cache_ttl),
            decision_cache: DecisionCache::new(decision_cache_ttl),
            category_map: tokio::sync::RwLock::new(CategoryMap::new()),
            catalog: tokio::sync::RwLock::new(Catalog::new()),
            router,
            detector,
            config,
            ended_sessions: AtomicU64::new(0),
            cumulative_reduction_sum: std::sync::Mutex::new(0.0),
        }
    }

    /// Connect every configured back-end and discover its catalog (spec.md
    /// §3 "Clients created at hub startup"). A Client that fails to
    /// connect stays `FAILED`; its absence just shrinks the catalog,
    /// it never aborts startup for the rest of the fleet.
    pub async fn start(&self) {
        for (name, client_config) in &self.config.clients {
            if !client_config.enabled {
                continue;
            }
            let Some(client) = self.router.client(name) else {
                continue;
            };
            if let Err(e) = client.connect(client_config).await {
                tracing::warn!(client = %name, error = %e, "failed to connect back-end");
                continue;
            }
            self.discover_from(&client).await;
        }
    }

    async fn discover_from(&self, client: &Client) {
        let tools = match client.discover_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                tracing::warn!(client = %client.name, error = %e, "failed to discover tools");
                return;
            }
        };
        let mut catalog = self.catalog.write().await;
        let mut category_map = self.category_map.write().await;
        catalog.remove_server(&client.name);
        for discovered in tools {
            let id = tool_id(&client.name, &discovered.local_name);
            let category = self
                .config
                .catalog
                .category_overrides
                .get(&id)
                .and_then(|s| Category::parse(s))
                .unwrap_or(Category::External);
            let is_core = self.config.catalog.core_tools.iter().any(|c| c == &id);
            category_map.insert(id.clone(), category, is_core);
            if let Some(deps) = self.config.catalog.dependencies.get(&id) {
                category_map.set_dependencies(id.clone(), deps.clone());
            }
            let token_cost = estimate_token_cost(&discovered.description);
            catalog.insert(ToolDescriptor {
                id,
                description: discovered.description,
                owning_server_id: client.name.clone(),
                input_schema: discovered.input_schema,
                category,
                tier: category.tier(),
                token_cost,
                priority: 0,
            });
        }
        // Statically-declared core tools with no owning Client still need
        // a category-map entry so the Planner can include them (spec.md
        // §3 invariant: core-tools present in every non-error LoadDecision).
        for id in &self.config.catalog.core_tools {
            if category_map.category_of(id).is_none() {
                category_map.insert(id.clone(), Category::Core, true);
            }
        }
    }

    /// `ListTools(session_id, user_id, query, context, overrides?)` (spec.md §4.4).
    pub async fn list_tools(
        &self,
        session_id: Uuid,
        user_id: &str,
        query: &str,
        context: Context,
        overrides: Option<SessionOverrides>,
    ) -> ListToolsResponse {
        let session = self.sessions.find_or_create(session_id, user_id).await;
        if let Some(overrides) = overrides {
            self.sessions
                .with_session(session_id, |s| s.overrides = overrides)
                .await;
        }

        if !self.config.enabled || !self.config.filtering {
            let catalog = self.catalog.read().await;
            let category_map = self.category_map.read().await;
            let tools: Vec<ToolId> = catalog.iter().map(|t| t.id.clone()).collect();
            let decision = LoadDecision {
                tools: tools.into_iter().collect(),
                tier_breakdown: Default::default(),
                estimated_tokens: catalog.total_token_cost(),
                confidence_mean: 1.0,
                strategy: session.strategy,
                fallback_reason: "filtering disabled".into(),
                overrides_applied: Vec::new(),
            };
            let _ = category_map;
            return ListToolsResponse {
                tools: materialize(&decision, &catalog),
                decision,
            };
        }

        let normalized_query = query.trim().to_lowercase();
        let detection_key = detection_cache_key(&normalized_query, &context);
        let detection = if self.config.cache {
            self.detection_cache.get(detection_key)
        } else {
            None
        };
        let detection = match detection {
            Some(cached) => cached,
            None => {
                let recent_queries = session.recent_queries();
                let recent_categories = session.recent_categories();
                let view = SessionView {
                    recent_queries: &recent_queries,
                    recent_categories: &recent_categories,
                    is_new_user: session.is_new_user(),
                };
                let result = self.detector.detect(query, &context, view).await;
                if self.config.cache {
                    self.detection_cache.insert(detection_key, result.clone());
                }
                result
            }
        };

        let session_overrides = self
            .sessions
            .with_session(session_id, |s| s.overrides.clone())
            .await
            .unwrap_or_default();

        let decision_key = cache_key(
            &normalized_query,
            session.strategy,
            &session_overrides.force_categories.iter().copied().collect::<Vec<_>>(),
            &session_overrides.disable_categories.iter().copied().collect::<Vec<_>>(),
        );
        let decision = if self.config.cache {
            self.decision_cache.get(decision_key)
        } else {
            None
        };
        let category_map = self.category_map.read().await;
        let catalog = self.catalog.read().await;
        let decision = match decision {
            Some(cached) => cached,
            None => {
                let computed = self.planner.plan(
                    &detection,
                    session.strategy,
                    Some(&session_overrides),
                    &category_map,
                    &catalog,
                );
                let capped = apply_cap(computed, self.config.max_tools, &category_map);
                if self.config.cache {
                    self.decision_cache.insert(decision_key, capped.clone());
                }
                capped
            }
        };

        self.sessions
            .with_session(session_id, |s| {
                s.metrics.detections += 1;
                if detection.fallback_tag != crate::detector::FallbackTag::None {
                    s.metrics.fallbacks += 1;
                }
                s.metrics.tokens_loaded += decision.estimated_tokens;
                s.metrics.tokens_baseline += catalog.total_token_cost();
                s.push_history(HistoryEntry {
                    query: query.to_string(),
                    categories: detection.categories.clone(),
                    tools_used: Vec::new(),
                });
            })
            .await;

        ListToolsResponse {
            tools: materialize(&decision, &catalog),
            decision,
        }
    }

    /// `CallTool(session_id, name, args)` (spec.md §4.4).
    pub async fn call_tool(
        &self,
        session_id: Uuid,
        name: &str,
        args: serde_json::Value,
    ) -> Result<crate::client::CallOutcome, HubError> {
        let catalog = self.catalog.read().await;
        let descriptor = catalog
            .get(name)
            .ok_or_else(|| HubError::UnknownTool { id: name.to_string() })?;
        let server = descriptor.owning_server_id.clone();
        let local_name = name
            .strip_prefix(&format!("{server}__"))
            .unwrap_or(name)
            .to_string();
        drop(catalog);

        let client = self
            .router
            .client(&server)
            .ok_or_else(|| HubError::ServerUnavailable { server: server.clone() })?;
        if client.state() != ClientState::Ready {
            return Err(HubError::ServerUnavailable { server });
        }

        let result = client.call_tool(&local_name, args).await;
        self.sessions
            .with_session(session_id, |s| {
                if result.is_ok() {
                    s.record_tool_use(name);
                } else {
                    s.metrics.errors += 1;
                }
            })
            .await;
        result
    }

    /// `EndSession(session_id)` (spec.md §4.4).
    pub async fn end_session(&self, session_id: Uuid) -> Option<EndSessionSummary> {
        let session = self.sessions.end(session_id).await?;
        let reduction = session.metrics.token_reduction();
        self.ended_sessions.fetch_add(1, Ordering::Relaxed);
        *self.cumulative_reduction_sum.lock().unwrap() += reduction;
        Some(EndSessionSummary {
            session_id,
            token_reduction: reduction,
            metrics: session.metrics,
        })
    }

    /// `ExecuteCommand(session_id, cmd)` (spec.md §4.4): a small hand-written
    /// parser over `/load-<cat>`, `/unload-<cat>`, `/strategy <name>`,
    /// mutating the same `SessionOverrides` the programmatic path uses.
    pub async fn execute_command(&self, session_id: Uuid, cmd: &str) -> Result<(), HubError> {
        let cmd = cmd.trim();
        if let Some(category_name) = cmd.strip_prefix("/load-") {
            let category = Category::parse(category_name)
                .ok_or_else(|| HubError::ConfigInvalid(format!("unknown category '{category_name}'")))?;
            self.sessions
                .with_session(session_id, |s| s.overrides.force(category))
                .await;
        } else if let Some(category_name) = cmd.strip_prefix("/unload-") {
            let category = Category::parse(category_name)
                .ok_or_else(|| HubError::ConfigInvalid(format!("unknown category '{category_name}'")))?;
            self.sessions
                .with_session(session_id, |s| s.overrides.disable(category))
                .await;
        } else if let Some(rest) = cmd.strip_prefix("/strategy ") {
            let strategy = parse_strategy(rest.trim())
                .ok_or_else(|| HubError::ConfigInvalid(format!("unknown strategy '{rest}'")))?;
            self.sessions
                .with_session(session_id, |s| s.strategy = strategy)
                .await;
        } else {
            return Err(HubError::ConfigInvalid(format!("unrecognized command '{cmd}'")));
        }
        Ok(())
    }

    /// `hub_status()` (SPEC_FULL.md §4.4, operator status surface).
    pub async fn hub_status(&self) -> HubStatus {
        let mut ready = 0;
        let mut failed = 0;
        for client in self.router.clients() {
            match client.state() {
                ClientState::Ready => ready += 1,
                ClientState::Failed => failed += 1,
                _ => {}
            }
        }
        let ended = self.ended_sessions.load(Ordering::Relaxed);
        let cumulative = if ended == 0 {
            0.0
        } else {
            *self.cumulative_reduction_sum.lock().unwrap() / ended as f64
        };
        HubStatus {
            ready_clients: ready,
            failed_clients: failed,
            catalog_size: self.catalog.read().await.len(),
            active_sessions: self.sessions.active_count().await,
            cumulative_token_reduction: cumulative,
        }
    }

    /// Background idle-session sweep (spec.md §4.4 "retired after an idle TTL").
    pub async fn reap_idle_sessions(&self) -> usize {
        self.sessions.reap_idle().await
    }

    pub async fn shutdown(&self) {
        self.router.shutdown_all().await;
    }
}

fn materialize(decision: &LoadDecision, catalog: &Catalog) -> Vec<ToolDescriptor> {
    decision
        .tools
        .iter()
        .filter_map(|id| catalog.get(id).cloned())
        .collect()
}

/// Rough token-cost estimate from a tool's description length, in the
/// absence of a precomputed cost from the back-end (spec.md §3 `token_cost`
/// is "precomputed"; back-ends speaking plain TSP/MCP don't supply one).
fn estimate_token_cost(description: &str) -> u32 {
    (description.len() / 4).max(10) as u32
}

fn parse_strategy(s: &str) -> Option<Strategy> {
    match s.to_ascii_uppercase().as_str() {
        "CONSERVATIVE" => Some(Strategy::Conservative),
        "BALANCED" => Some(Strategy::Balanced),
        "AGGRESSIVE" => Some(Strategy::Aggressive),
        "USER_CONTROLLED" => Some(Strategy::UserControlled),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::keywords::DetectorConfig;

    fn hub() -> Hub {
        let detector = Detector::new(DetectorConfig::default(), 0.25, 0.55);
        Hub::new(Config::default(), detector)
    }

    #[tokio::test]
    async fn list_tools_always_exposes_core_even_with_empty_catalog() {
        let hub = hub();
        let response = hub
            .list_tools(Uuid::new_v4(), "alice", "", Context::default(), None)
            .await;
        // No core tools are statically configured in the default config,
        // so an empty catalog legitimately yields an empty tool list; the
        // Planner-level invariant is covered in planner::tests instead.
        assert_eq!(response.tools.len(), 0);
    }

    #[tokio::test]
    async fn call_tool_with_unknown_id_fails() {
        let hub = hub();
        let err = hub
            .call_tool(Uuid::new_v4(), "nonexistent__tool", serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::UnknownTool { .. }));
    }

    #[tokio::test]
    async fn execute_command_unload_then_load_applies_override() {
        let hub = hub();
        let session_id = Uuid::new_v4();
        hub.list_tools(session_id, "alice", "", Context::default(), None).await;
        hub.execute_command(session_id, "/load-debug").await.unwrap();
        let overrides = hub
            .sessions
            .with_session(session_id, |s| s.overrides.clone())
            .await
            .unwrap();
        assert!(overrides.force_categories.contains(&Category::Debug));
    }

    #[tokio::test]
    async fn execute_command_rejects_unknown_category() {
        let hub = hub();
        let session_id = Uuid::new_v4();
        hub.list_tools(session_id, "alice", "", Context::default(), None).await;
        let err = hub.execute_command(session_id, "/load-bogus").await.unwrap_err();
        assert!(matches!(err, HubError::ConfigInvalid(_)));
    }

    #[tokio::test]
    async fn end_session_computes_token_reduction() {
        let hub = hub();
        let session_id = Uuid::new_v4();
        hub.list_tools(session_id, "alice", "", Context::default(), None).await;
        let summary = hub.end_session(session_id).await.unwrap();
        assert_eq!(summary.session_id, session_id);
    }

    #[tokio::test]
    async fn hub_status_reports_zero_clients_with_no_config() {
        let hub = hub();
        let status = hub.hub_status().await;
        assert_eq!(status.ready_clients, 0);
        assert_eq!(status.failed_clients, 0);
    }
}
