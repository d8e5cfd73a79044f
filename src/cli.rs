//! `clap`-derived CLI surface (SPEC_FULL.md §2 "CLI"): `serve` runs the hub
//! as a stdio JSON-RPC front door for an agent, `status` prints
//! `hub_status()`, `catalog` dumps the aggregated tool catalog.

use crate::catalog::keywords::DetectorConfig;
use crate::config::load_config;
use crate::detector::{Context, Detector};
use crate::hub::Hub;
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "toolhub")]
#[command(about = "Tool-routing hub for LLM agents")]
pub struct Cli {
    /// Path to a TOML config file (default resolved via the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the hub as a line-delimited JSON-RPC front door over stdio.
    Serve,
    /// Connect to configured back-ends, discover their catalogs, print `hub_status()`.
    Status,
    /// Connect to configured back-ends and dump the aggregated tool catalog.
    Catalog,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Status => status(config).await,
        Commands::Catalog => catalog(config).await,
    }
}

fn build_hub(config: crate::config::Config) -> Hub {
    let detector = Detector::new(
        DetectorConfig::default(),
        crate::planner::PlannerConfig::default().t2_threshold,
        crate::planner::PlannerConfig::default().t3_threshold,
    );
    Hub::new(config, detector)
}

async fn status(config: crate::config::Config) -> Result<()> {
    let hub = build_hub(config);
    hub.start().await;
    let status = hub.hub_status().await;
    println!("ready clients:     {}", status.ready_clients);
    println!("failed clients:    {}", status.failed_clients);
    println!("catalog size:      {}", status.catalog_size);
    println!("active sessions:   {}", status.active_sessions);
    println!(
        "avg token reduction: {:.1}%",
        status.cumulative_token_reduction * 100.0
    );
    hub.shutdown().await;
    Ok(())
}

async fn catalog(config: crate::config::Config) -> Result<()> {
    let hub = build_hub(config);
    hub.start().await;
    let session_id = Uuid::new_v4();
    let response = hub
        .list_tools(session_id, "cli", "", Context::default(), None)
        .await;
    for tool in &response.tools {
        println!("{}\t{}\t{}", tool.id, tool.category, tool.token_cost);
    }
    hub.end_session(session_id).await;
    hub.shutdown().await;
    Ok(())
}

/// One line of the stdio front door (spec.md §1 treats wire framing as an
/// external collaborator; this is the minimal request/response envelope
/// the hub needs to drive its four operations from a JSON-RPC-speaking
/// agent process).
#[derive(Debug, Deserialize)]
struct Request {
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct Response {
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

async fn serve(config: crate::config::Config) -> Result<()> {
    let hub = build_hub(config);
    hub.start().await;

    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => dispatch(&hub, request).await,
            Err(e) => Response {
                id: Value::Null,
                result: None,
                error: Some(ErrorBody {
                    code: "PROTOCOL_ERROR",
                    message: e.to_string(),
                }),
            },
        };
        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }

    hub.shutdown().await;
    Ok(())
}

async fn dispatch(hub: &Hub, request: Request) -> Response {
    let id = request.id.clone();
    match handle(hub, &request.method, request.params).await {
        Ok(result) => Response {
            id,
            result: Some(result),
            error: None,
        },
        Err(e) => Response {
            id,
            result: None,
            error: Some(ErrorBody {
                code: e.kind(),
                message: e.to_string(),
            }),
        },
    }
}

async fn handle(hub: &Hub, method: &str, params: Value) -> Result<Value, crate::errors::HubError> {
    match method {
        "list_tools" => {
            let session_id = field_uuid(&params, "session_id")?;
            let user_id = field_str(&params, "user_id").unwrap_or_default();
            let query = field_str(&params, "query").unwrap_or_default();
            let context: Context = params
                .get("context")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e: serde_json::Error| crate::errors::HubError::ConfigInvalid(e.to_string()))?
                .unwrap_or_default();
            let response = hub
                .list_tools(session_id, &user_id, &query, context, None)
                .await;
            Ok(serde_json::json!({
                "tools": response.tools.iter().map(|t| serde_json::json!({
                    "id": t.id,
                    "description": t.description,
                    "category": t.category.to_string(),
                    "token_cost": t.token_cost,
                })).collect::<Vec<_>>(),
                "estimated_tokens": response.decision.estimated_tokens,
                "fallback_reason": response.decision.fallback_reason,
            }))
        }
        "call_tool" => {
            let session_id = field_uuid(&params, "session_id")?;
            let name = field_str(&params, "name").unwrap_or_default();
            let args = params.get("args").cloned().unwrap_or(Value::Null);
            let outcome = hub.call_tool(session_id, &name, args).await?;
            Ok(serde_json::json!({
                "output": outcome.output,
                "is_error": outcome.is_error,
            }))
        }
        "end_session" => {
            let session_id = field_uuid(&params, "session_id")?;
            let summary = hub.end_session(session_id).await;
            Ok(match summary {
                Some(s) => serde_json::json!({ "token_reduction": s.token_reduction }),
                None => Value::Null,
            })
        }
        "execute_command" => {
            let session_id = field_uuid(&params, "session_id")?;
            let cmd = field_str(&params, "cmd").unwrap_or_default();
            hub.execute_command(session_id, &cmd).await?;
            Ok(Value::Null)
        }
        "hub_status" => {
            let status = hub.hub_status().await;
            Ok(serde_json::json!({
                "ready_clients": status.ready_clients,
                "failed_clients": status.failed_clients,
                "catalog_size": status.catalog_size,
                "active_sessions": status.active_sessions,
                "cumulative_token_reduction": status.cumulative_token_reduction,
            }))
        }
        other => Err(crate::errors::HubError::ConfigInvalid(format!(
            "unknown method '{other}'"
        ))),
    }
}

fn field_str(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(Value::as_str).map(str::to_string)
}

fn field_uuid(params: &Value, key: &str) -> Result<Uuid, crate::errors::HubError> {
    field_str(params, key)
        .and_then(|s| Uuid::parse_str(&s).ok())
        .ok_or_else(|| crate::errors::HubError::ConfigInvalid(format!("missing or invalid '{key}'")))
}
