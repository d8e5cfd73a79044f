//! Typed configuration structs. Every field has a compiled-in default so a
//! `Config` can always be built even with no env vars and no file present
//! (spec.md §6's "env-first, overridable by file" falls all the way back
//! to these constants).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

fn default_true() -> bool {
    true
}

fn default_max_tools() -> usize {
    25
}

fn default_detection_timeout_ms() -> u64 {
    50
}

fn default_list_tools_timeout_ms() -> u64 {
    5000
}

fn default_client_timeout_ms() -> u64 {
    30_000
}

fn default_detection_cache_ttl_sec() -> u64 {
    300
}

fn default_decision_cache_ttl_sec() -> u64 {
    3600
}

fn default_session_idle_ttl_sec() -> u64 {
    3600
}

fn default_pending_request_bound() -> usize {
    64
}

/// Top-level hub configuration (spec.md §6 "Configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bypass the planner entirely and return the full union catalog.
    #[serde(default = "default_true")]
    pub filtering: bool,

    #[serde(default = "default_max_tools")]
    pub max_tools: usize,

    /// Use `safe_default` on a planner/detector error instead of surfacing it.
    #[serde(default = "default_true")]
    pub fallback: bool,

    #[serde(default = "default_detection_timeout_ms")]
    pub detection_timeout_ms: u64,

    #[serde(default = "default_list_tools_timeout_ms")]
    pub list_tools_timeout_ms: u64,

    #[serde(default = "default_client_timeout_ms")]
    pub client_timeout_ms: u64,

    #[serde(default = "default_true")]
    pub cache: bool,

    #[serde(default = "default_detection_cache_ttl_sec")]
    pub detection_cache_ttl_sec: u64,

    #[serde(default = "default_decision_cache_ttl_sec")]
    pub decision_cache_ttl_sec: u64,

    #[serde(default = "default_session_idle_ttl_sec")]
    pub session_idle_ttl_sec: u64,

    #[serde(default = "default_pending_request_bound")]
    pub pending_request_bound: usize,

    /// Back-end Client definitions, keyed by server name.
    #[serde(default)]
    pub clients: HashMap<String, ClientConfig>,

    /// Static category → tool-name mapping data (spec.md §1 "out of
    /// scope... treated as data, not logic").
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            filtering: true,
            max_tools: default_max_tools(),
            fallback: true,
            detection_timeout_ms: default_detection_timeout_ms(),
            list_tools_timeout_ms: default_list_tools_timeout_ms(),
            client_timeout_ms: default_client_timeout_ms(),
            cache: true,
            detection_cache_ttl_sec: default_detection_cache_ttl_sec(),
            decision_cache_ttl_sec: default_decision_cache_ttl_sec(),
            session_idle_ttl_sec: default_session_idle_ttl_sec(),
            pending_request_bound: default_pending_request_bound(),
            clients: HashMap::new(),
            catalog: CatalogConfig::default(),
        }
    }
}

impl Config {
    /// Basic structural validation, surfaced as `HubError::ConfigInvalid`
    /// (spec.md §6/§7 `CONFIG_INVALID`, fatal at startup only).
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tools == 0 {
            return Err("max_tools must be at least 1".into());
        }
        if self.detection_timeout_ms == 0 {
            return Err("detection_timeout_ms must be positive".into());
        }
        for (name, client) in &self.clients {
            client
                .validate()
                .map_err(|e| format!("client '{name}': {e}"))?;
        }
        Ok(())
    }
}

/// Which transport a back-end Client speaks (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Stdio,
    Sse,
}

/// One configured back-end (spec.md §4.3 `ClientConfig`).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub name: String,
    pub transport: Transport,
    /// Command + args for `stdio`; ignored for `sse`.
    pub command: Option<String>,
    pub args: Vec<String>,
    /// Extra environment variables passed to a `stdio` child process, on
    /// top of the scrubbed allow-list (may carry secrets — redacted below).
    pub env: HashMap<String, String>,
    /// Endpoint URL for `sse`; ignored for `stdio`.
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_client_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            transport: Transport::Stdio,
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            url: None,
            enabled: true,
            timeout_ms: default_client_timeout_ms(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self.transport {
            Transport::Stdio if self.command.is_none() => {
                Err("stdio transport requires `command`".into())
            }
            Transport::Sse if self.url.is_none() => Err("sse transport requires `url`".into()),
            _ => Ok(()),
        }
    }
}

/// Static tool-ID → category assignment, the "category → tool-name list"
/// data spec.md §1 explicitly treats as data rather than logic. Unmapped
/// discovered tools default to `external` (spec.md §3 tier T3), the most
/// conservative catch-all bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// `<server>__<local_name>` tool IDs always exposed regardless of Client state.
    pub core_tools: Vec<String>,
    /// `<server>__<local_name>` → category name, overriding the default bucket.
    pub category_overrides: HashMap<String, String>,
    /// `<server>__<local_name>` → the tool IDs it depends on (spec.md §4.2 step 5).
    pub dependencies: HashMap<String, Vec<String>>,
}

// Hand-rolled `Debug` so secrets placed in `env` (API keys, tokens passed
// through to a back-end) never land in a log line.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted_env: HashMap<&str, &str> =
            self.env.keys().map(|k| (k.as_str(), "<redacted>")).collect();
        f.debug_struct("ClientConfig")
            .field("name", &self.name)
            .field("transport", &self.transport)
            .field("command", &self.command)
            .field("args", &self.args)
            .field("env", &redacted_env)
            .field("url", &self.url)
            .field("enabled", &self.enabled)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}
