//! Router & Client Supervisor (spec.md §4.3): one long-lived `Client` per
//! configured back-end, a `Router` dispatching calls by tool ID.

mod subprocess;

use crate::config::schema::{ClientConfig, Transport};
use crate::errors::HubError;
use rmcp::model::{CallToolRequestParams, CallToolResult, RawContent, Tool};
use rmcp::service::RunningService;
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

/// `INIT → CONNECTING → READY → (FAILED | CLOSED)` (spec.md §4.3 "States").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientState {
    Init = 0,
    Connecting = 1,
    Ready = 2,
    Failed = 3,
    Closed = 4,
}

impl ClientState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ClientState::Init,
            1 => ClientState::Connecting,
            2 => ClientState::Ready,
            3 => ClientState::Failed,
            _ => ClientState::Closed,
        }
    }
}

/// A single configured back-end connection. Only `READY` Clients may be
/// dispatched to (spec.md §4.3). State is tracked atomically so a reader
/// can check readiness without taking the connection lock.
pub struct Client {
    pub name: String,
    state: AtomicU8,
    timeout: Duration,
    pending: Semaphore,
    pending_bound: usize,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
}

/// Flattened tool description returned by discovery, category-agnostic
/// (category assignment is static config data, out of scope for the
/// Router per spec.md §1).
#[derive(Debug, Clone)]
pub struct DiscoveredTool {
    pub local_name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Result of a single `tools/call` dispatch (spec.md §4.3 "Call dispatch").
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub output: String,
    pub is_error: bool,
}

impl Client {
    pub fn new(config: &ClientConfig, pending_bound: usize) -> Self {
        Self {
            name: config.name.clone(),
            state: AtomicU8::new(ClientState::Init as u8),
            timeout: Duration::from_millis(config.timeout_ms),
            pending: Semaphore::new(pending_bound),
            pending_bound,
            service: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ClientState {
        ClientState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ClientState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Spawn/connect and perform the TSP handshake (spec.md §4.3 "Client
    /// lifecycle"). Never panics; connection failure transitions to
    /// `FAILED` and is reported to the caller so the Supervisor can log it
    /// without aborting the rest of the fleet.
    pub async fn connect(&self, config: &ClientConfig) -> anyhow::Result<()> {
        self.set_state(ClientState::Connecting);
        let result = match config.transport {
            Transport::Stdio => self.connect_stdio(config).await,
            Transport::Sse => self.connect_sse(config).await,
        };
        match result {
            Ok(service) => {
                *self.service.lock().await = Some(service);
                self.set_state(ClientState::Ready);
                Ok(())
            }
            Err(e) => {
                self.set_state(ClientState::Failed);
                Err(e)
            }
        }
    }

    async fn connect_stdio(&self, config: &ClientConfig) -> anyhow::Result<RunningService<RoleClient, ()>> {
        let command = config
            .command
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("stdio client '{}' has no command configured", self.name))?;
        let cmd = subprocess::scrubbed_command(command, &config.args, &config.env);
        let transport = TokioChildProcess::new(cmd)?;
        let service = ().serve(transport).await?;
        Ok(service)
    }

    async fn connect_sse(&self, config: &ClientConfig) -> anyhow::Result<RunningService<RoleClient, ()>> {
        let url = config
            .url
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("sse client '{}' has no url configured", self.name))?;
        let transport = StreamableHttpClientTransport::from_uri(url.as_str());
        let service = ().serve(transport).await?;
        Ok(service)
    }

    /// List every tool the back-end currently advertises.
    pub async fn discover_tools(&self) -> Result<Vec<DiscoveredTool>, HubError> {
        if self.state() != ClientState::Ready {
            return Err(HubError::ServerUnavailable {
                server: self.name.clone(),
            });
        }
        let guard = self.service.lock().await;
        let service = guard.as_ref().ok_or_else(|| HubError::ServerUnavailable {
            server: self.name.clone(),
        })?;
        let tools: Vec<Tool> = service
            .peer()
            .list_all_tools()
            .await
            .map_err(|e| map_service_error(&self.name, e))?;
        Ok(tools
            .into_iter()
            .map(|t| DiscoveredTool {
                local_name: t.name.to_string(),
                description: t.description.map(|d| d.to_string()).unwrap_or_default(),
                input_schema: serde_json::to_value(&*t.input_schema).unwrap_or(Value::Null),
            })
            .collect())
    }

    /// Dispatch one `tools/call` with the per-server timeout and the
    /// pending-request bound (spec.md §4.3, §5 "Back-pressure").
    pub async fn call_tool(&self, local_name: &str, args: Value) -> Result<CallOutcome, HubError> {
        if self.state() != ClientState::Ready {
            return Err(HubError::ServerUnavailable {
                server: self.name.clone(),
            });
        }
        let Ok(permit) = self.pending.try_acquire() else {
            return Err(HubError::ServerOverloaded {
                server: self.name.clone(),
            });
        };
        let _permit = permit;

        let arguments = match args {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                let mut map = Map::new();
                map.insert("input".to_string(), other);
                Some(map)
            }
        };

        let mut request = CallToolRequestParams::new(local_name.to_string());
        request.arguments = arguments;

        let guard = self.service.lock().await;
        let service = guard.as_ref().ok_or_else(|| HubError::ServerUnavailable {
            server: self.name.clone(),
        })?;

        let call = service.peer().call_tool(request);
        let result: CallToolResult = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => return Err(map_service_error(&self.name, e)),
            Err(_) => {
                return Err(HubError::Timeout {
                    server: self.name.clone(),
                    elapsed_ms: self.timeout.as_millis() as u64,
                });
            }
        };

        Ok(translate_result(result))
    }

    /// How many pending requests are currently in flight (for `hub_status`).
    pub fn pending_in_flight(&self) -> usize {
        self.pending_bound - self.pending.available_permits()
    }

    /// Terminate the connection, waking any pending waiters with
    /// `SHUTTING_DOWN` by virtue of dropping the `RunningService`
    /// (spec.md §4.3 "Shutdown").
    pub async fn shutdown(&self) {
        self.set_state(ClientState::Closed);
        if let Some(service) = self.service.lock().await.take() {
            if let Err(e) = service.cancel().await {
                tracing::warn!(client = %self.name, error = %e, "error shutting down client");
            }
        }
    }
}

fn map_service_error(server: &str, error: rmcp::ServiceError) -> HubError {
    match error {
        rmcp::ServiceError::Timeout { timeout } => HubError::Timeout {
            server: server.to_string(),
            elapsed_ms: timeout.as_millis() as u64,
        },
        rmcp::ServiceError::TransportClosed | rmcp::ServiceError::TransportSend(_) => {
            HubError::ServerUnavailable {
                server: server.to_string(),
            }
        }
        rmcp::ServiceError::Cancelled { .. } => HubError::ShuttingDown,
        rmcp::ServiceError::McpError(e) => HubError::ProtocolError {
            server: server.to_string(),
            detail: e.to_string(),
        },
        rmcp::ServiceError::UnexpectedResponse => HubError::ProtocolError {
            server: server.to_string(),
            detail: "unexpected response type".to_string(),
        },
        other => HubError::ProtocolError {
            server: server.to_string(),
            detail: other.to_string(),
        },
    }
}

fn translate_result(result: CallToolResult) -> CallOutcome {
    let mut parts = Vec::new();
    for content in &result.content {
        match &content.raw {
            RawContent::Text(text) => parts.push(text.text.clone()),
            RawContent::Image(_) => parts.push("[image content]".to_string()),
            RawContent::Audio(_) => parts.push("[audio content]".to_string()),
            RawContent::Resource(_) => parts.push("[resource content]".to_string()),
            RawContent::ResourceLink(link) => parts.push(format!("[resource link: {}]", link.uri)),
        }
    }
    let output = if parts.is_empty() {
        "(no output)".to_string()
    } else {
        parts.join("\n")
    };
    CallOutcome {
        output,
        is_error: result.is_error.unwrap_or(false),
    }
}

/// Owns every configured Client and dispatches by server name (spec.md
/// §4.3). Catalog → owning-server lookup lives in `hub::Hub`, which holds
/// both the Catalog and the Router without the Router needing to know
/// about tool IDs at all (spec.md §9 "avoid cyclic ownership").
pub struct Router {
    clients: Arc<std::collections::HashMap<String, Arc<Client>>>,
}

impl Router {
    pub fn new(clients: std::collections::HashMap<String, Arc<Client>>) -> Self {
        Self {
            clients: Arc::new(clients),
        }
    }

    pub fn client(&self, server: &str) -> Option<Arc<Client>> {
        self.clients.get(server).cloned()
    }

    pub fn clients(&self) -> impl Iterator<Item = &Arc<Client>> {
        self.clients.values()
    }

    pub async fn shutdown_all(&self) {
        for client in self.clients.values() {
            client.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn stdio_config(name: &str) -> ClientConfig {
        ClientConfig {
            name: name.into(),
            transport: Transport::Stdio,
            command: Some("/bin/does-not-matter".into()),
            args: Vec::new(),
            env: HashMap::new(),
            url: None,
            enabled: true,
            timeout_ms: 1000,
        }
    }

    #[test]
    fn new_client_starts_in_init_state() {
        let client = Client::new(&stdio_config("git"), 4);
        assert_eq!(client.state(), ClientState::Init);
    }

    #[tokio::test]
    async fn non_ready_client_rejects_calls() {
        let client = Client::new(&stdio_config("git"), 4);
        let err = client.call_tool("status", Value::Null).await.unwrap_err();
        assert!(matches!(err, HubError::ServerUnavailable { .. }));
    }

    #[tokio::test]
    async fn non_ready_client_rejects_discovery() {
        let client = Client::new(&stdio_config("git"), 4);
        let err = client.discover_tools().await.unwrap_err();
        assert!(matches!(err, HubError::ServerUnavailable { .. }));
    }

    #[test]
    fn translate_result_reports_no_output_for_empty_content() {
        let result = CallToolResult::success(Vec::new());
        let outcome = translate_result(result);
        assert_eq!(outcome.output, "(no output)");
        assert!(!outcome.is_error);
    }
}
