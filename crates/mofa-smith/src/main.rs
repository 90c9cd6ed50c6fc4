//! Cognitive Swarm Orchestrator — service entry point.
//!
//! Loads layered configuration, initialises structured logging, assembles
//! the orchestrator graph (C5) over its collaborators (C1-C4, C6-C8), and
//! exposes it as an A2A JSON-RPC endpoint so a gateway or another agent can
//! drive conversation turns the same way the orchestrator itself dispatches
//! to specialists.
//!
//! Grounded on `mofa-gateway/src/main.rs`'s entrypoint shape: env/file
//! config loading, `tracing_subscriber::fmt().with_env_filter(...)`, and an
//! exit-code-on-error `main`.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mofa_orchestrator::a2a::jsonrpc::JsonRpcError;
use mofa_orchestrator::a2a::{A2aClient, A2aServer, Artifact, Handler, PoolLimits, Task, TaskResult, TaskStatus};
use mofa_orchestrator::config::{AgentEndpointConfig, OrchestratorConfig};
use mofa_orchestrator::graph::{Checkpoint, CheckpointStore, CompiledGraph, GraphError, OrchestratorState};
use mofa_orchestrator::llm::NullLanguageModel;
use mofa_orchestrator::memory::NullExtractor;
use mofa_orchestrator::registry::AgentRegistry;
use mofa_orchestrator::resilience::RetryPolicy;
use mofa_orchestrator::store::{EmbeddedStore, Store};
use mofa_orchestrator::wiring::{build_orchestrator_graph, OrchestratorDeps};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mofa-smith", about = "Cognitive Swarm Orchestrator service")]
struct Args {
    /// Path to a TOML/YAML/JSON config file layered over the built-in
    /// defaults and `ORCHESTRATOR_*` environment variables.
    #[arg(long, env = "ORCHESTRATOR_CONFIG")]
    config: Option<String>,

    /// TCP port the A2A server listens on.
    #[arg(long, env = "ORCHESTRATOR_PORT", default_value_t = 4000)]
    port: u16,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mofa_orchestrator=info".parse().unwrap()))
        .init();

    if let Err(err) = run(args).await {
        eprintln!("orchestrator error: {err}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = mofa_orchestrator::config::load(args.config.as_deref())?;
    info!(environment = ?config.environment, agents = config.agents.len(), "configuration loaded");

    let store: Arc<dyn Store> = Arc::new(EmbeddedStore::connect(&config.database.path).await?);

    let retry_policy = RetryPolicy {
        max_attempts: config.a2a.retry_attempts,
        ..RetryPolicy::default()
    };
    let pool_limits = PoolLimits {
        max_connections_total: config.a2a.connection_pool_size,
        max_connections_per_host: config.a2a.connection_pool_size_per_host,
        dns_cache_ttl: Duration::from_secs(config.a2a.dns_cache_ttl_secs),
        keepalive_timeout: Duration::from_secs(config.a2a.keepalive_timeout_secs),
    };
    let a2a_client = Arc::new(A2aClient::new(pool_limits, retry_policy));

    let registry = Arc::new(AgentRegistry::new(a2a_client.clone()));
    register_configured_agents(&registry, &config.agents).await;
    registry.probe_all().await;
    let _probe_loop = registry.clone().spawn_probe_loop(Duration::from_secs(30));

    // No concrete LM provider ships with this crate (out of scope, spec §1
    // "the language-model provider itself"); these are the pluggable seam
    // an operator wires a real provider into.
    if config.llm.api_key.is_none() {
        warn!("no llm.api_key configured; running with NullLanguageModel/NullExtractor stand-ins");
    }

    let checkpoints = Arc::new(CheckpointStore::new(store.clone()));
    let deps = OrchestratorDeps {
        llm: Arc::new(NullLanguageModel),
        extractor: Arc::new(NullExtractor),
        store: store.clone(),
        registry,
        a2a_client,
        conversation: config.conversation.clone(),
        task_timeout: config.a2a.timeout(),
        checkpoints: Some(checkpoints.clone()),
    };
    let graph = build_orchestrator_graph(deps)?;

    let handler = Arc::new(OrchestratorTaskHandler { graph, checkpoints, store });
    let app = A2aServer::new()
        .register("process_task", handler)
        .with_max_concurrent(config.a2a.connection_pool_size_per_host)
        .build_app();

    info!(port = args.port, "orchestrator A2A server starting");
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn register_configured_agents(registry: &AgentRegistry, agents: &std::collections::HashMap<String, AgentEndpointConfig>) {
    for (name, endpoint) in agents {
        let url = format!("http://{}:{}/rpc", endpoint.host, endpoint.port);
        match registry.register(name.clone(), url.clone()).await {
            Ok(()) => info!(agent = %name, endpoint = %url, "registered specialist agent"),
            Err(err) => warn!(agent = %name, error = %err, "failed to register specialist agent"),
        }
    }
}

const PENDING_NODE_KEY: &str = "pending_node";

fn checkpoint_namespace(thread_id: &str) -> Vec<String> {
    vec!["checkpoint".to_string(), thread_id.to_string()]
}

/// Exposes the orchestrator graph itself as an A2A `process_task` handler:
/// a caller submits a `Task` carrying the user's message plus
/// `{user_id, thread_id}` in `context`, and gets back the orchestrator's
/// reply (or, if a plan is awaiting approval, an interrupt prompt) as a
/// `TaskResult` artifact. Suspended runs are resumed transparently on the
/// next call for the same `thread_id` (spec §4.4 "Interruption & resume").
struct OrchestratorTaskHandler {
    graph: CompiledGraph,
    checkpoints: Arc<CheckpointStore>,
    store: Arc<dyn Store>,
}

#[async_trait::async_trait]
impl Handler for OrchestratorTaskHandler {
    async fn handle(&self, params: Value) -> Result<Value, JsonRpcError> {
        let task: Task = serde_json::from_value(params).map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;
        let user_id = task.context.get("user_id").and_then(Value::as_str).unwrap_or("anonymous").to_string();
        let thread_id = task.context.get("thread_id").and_then(Value::as_str).unwrap_or(&task.id).to_string();

        let ns = checkpoint_namespace(&thread_id);
        let pending_node = self.store.get(&ns, PENDING_NODE_KEY).await.ok().flatten().and_then(|v| v.as_str().map(str::to_string));

        let run_result = match pending_node {
            Some(node_id) => {
                let mut state = match self.checkpoints.load(&thread_id).await {
                    Ok(Some(state)) => state,
                    _ => return Err(JsonRpcError::internal("no checkpoint found for a thread awaiting resume")),
                };
                if let Some(approved) = task.context.get("approved").and_then(Value::as_bool) {
                    if let Some(plan) = state.plan_execute_task.as_mut() {
                        plan.approved = Some(approved);
                    }
                }
                let checkpoint = Checkpoint { thread_id: thread_id.clone(), node_id, state: state.clone() };
                self.graph.resume(checkpoint, state).await
            }
            None => {
                let mut state = self
                    .checkpoints
                    .load(&thread_id)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| OrchestratorState::new(user_id.as_str(), thread_id.as_str()));
                state.messages.push(mofa_orchestrator::graph::ChatMessage::new(
                    mofa_orchestrator::graph::MessageRole::User,
                    task.instruction.clone(),
                ));
                self.graph.invoke(state).await
            }
        };

        match run_result {
            Ok(state) => {
                let _ = self.store.delete(&ns, PENDING_NODE_KEY).await;
                if let Err(err) = self.checkpoints.save(&state).await {
                    warn!(thread_id = %thread_id, error = %err, "failed to persist conversation checkpoint");
                }
                let reply = state.messages.iter().rev().find(|m| m.role == mofa_orchestrator::graph::MessageRole::Assistant).map(|m| m.content.clone()).unwrap_or_default();
                let result = TaskResult {
                    status: TaskStatus::Completed,
                    artifacts: vec![Artifact::new(task.id.clone(), "text/plain", Value::String(reply))],
                    metadata: None,
                };
                Ok(serde_json::to_value(result).expect("task result always serializes"))
            }
            Err(GraphError::Interrupted { prompt, checkpoint }) => {
                if let Err(err) = self.checkpoints.save(&checkpoint.state).await {
                    warn!(thread_id = %thread_id, error = %err, "failed to persist suspended checkpoint");
                }
                if let Err(err) = self.store.put(&ns, PENDING_NODE_KEY, Value::String(checkpoint.node_id.clone())).await {
                    warn!(thread_id = %thread_id, error = %err, "failed to persist pending node id");
                }
                // Suspended pending human approval: not a completed reply, and the
                // wire contract has no third status, so this surfaces as failed
                // with the prompt as its artifact (spec §6 `status:"completed"|"failed"`).
                let result = TaskResult {
                    status: TaskStatus::Failed,
                    artifacts: vec![Artifact::new(task.id.clone(), "application/json", serde_json::json!({ "prompt": prompt }))],
                    metadata: None,
                };
                Ok(serde_json::to_value(result).expect("task result always serializes"))
            }
            Err(other) => Err(JsonRpcError::internal(other.to_string())),
        }
    }
}
