//! Wire types for the A2A (agent-to-agent) protocol (spec §6).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// `{name, version, description, capabilities[], endpoints{name→path},
/// communication_modes[], metadata?}` (spec §6 "Agent Card JSON").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCard {
    pub name: String,
    pub version: String,
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
    #[serde(default)]
    pub communication_modes: Vec<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl AgentCard {
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }
}

/// `{id, instruction, context{}, state_snapshot?{}, artifacts[], metadata?}`
/// (spec §6 "Task JSON").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub instruction: String,
    #[serde(default)]
    pub context: Value,
    #[serde(default)]
    pub state_snapshot: Option<Value>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl Task {
    pub fn new(id: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            instruction: instruction.into(),
            context: Value::Object(Default::default()),
            state_snapshot: None,
            artifacts: Vec::new(),
            metadata: None,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }
}

/// Immutable output produced by a task (spec §3 "Artifact": "unique id,
/// owning task id, content (opaque bytes with MIME type), metadata").
/// Artifacts are append-only and referentially independent of the task's
/// lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub task_id: String,
    pub mime_type: String,
    pub content: Value,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl Artifact {
    pub fn new(task_id: impl Into<String>, mime_type: impl Into<String>, content: Value) -> Self {
        Self { id: uuid::Uuid::new_v4().to_string(), task_id: task_id.into(), mime_type: mime_type.into(), content, metadata: None }
    }
}

/// `"completed"` once a task ran to a reply, `"failed"` on an unrecoverable
/// error (spec §6 "`process_task` → `{artifacts:[Artifact…],
/// status:"completed"|"failed"}`").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Completed,
    Failed,
}

/// The full response payload of a `process_task` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub status: TaskStatus,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub metadata: Option<Value>,
}
