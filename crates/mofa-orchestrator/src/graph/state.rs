//! Orchestrator state record (spec §3 "Orchestrator State").
//!
//! Unlike the teacher's `workflow::state::JsonState` (a dynamically-keyed
//! JSON map), this is a fixed record with declared fields — per design note
//! §9 "Dynamically-typed state record", unknown keys have nowhere to go and
//! are rejected simply by not existing as fields.

use crate::memory::UserMemory;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A single invocation of a tool requested by the chatbot node
/// (spec §4.5 "`chatbot`... invokes an LM bound to the tool catalogue").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// A single chat message flowing through `messages`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// Tool calls requested by an assistant message (spec §4.5 "`tools`:
    /// executes any tool calls in the last message").
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Set on a `Tool`-role message to the id of the [`ToolCall`] it answers.
    #[serde(default)]
    pub tool_call_id: Option<String>,
    /// Present when this message should be elided by the next reducer pass
    /// rather than appended (spec §3, §4.4 "add-messages reducer").
    #[serde(default)]
    pub remove: bool,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            remove: false,
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: MessageRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            remove: false,
        }
    }

    /// A sentinel instructing the `messages` reducer to remove the message
    /// with `id` from state (spec §4.4 "honours remove-message sentinels").
    pub fn remove_sentinel(id: Uuid) -> Self {
        Self {
            id,
            role: MessageRole::System,
            content: String::new(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            remove: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A bounded orchestrator event (spec §3 "events": size cap 50).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorEvent {
    pub kind: String,
    pub detail: String,
}

pub const EVENTS_CAP: usize = 50;

/// Routing payload returned by a tool call requesting hand-off to the
/// plan-execute subgraph (spec §4.5 "plan_execute").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlanExecuteTask {
    pub goal: String,
    #[serde(default)]
    pub approved: Option<bool>,
}

/// The value flowing through the graph (spec §3).
///
/// Invariants maintained by construction + reducers:
/// every message has a unique id; `last_memory_update_index <= messages.len()`;
/// `events.len() <= EVENTS_CAP`; `memory` is always a valid instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorState {
    pub messages: Vec<ChatMessage>,
    pub summary: String,
    pub memory: UserMemory,
    pub events: Vec<OrchestratorEvent>,
    pub user_id: String,
    pub thread_id: String,
    pub memory_init_done: bool,
    pub last_memory_update_index: usize,
    pub needs_plan_execute: bool,
    pub plan_execute_task: Option<PlanExecuteTask>,
    /// Name of the delegate agent a `call_agent` dispatch is currently
    /// outstanding against, if any. Cleared unconditionally once that
    /// dispatch resolves, including on client-side timeout, so a stale
    /// entry can never outlive the call that set it (spec §9 "requires
    /// timeout clearing of `interrupted_workflow` context on client
    /// timeout").
    #[serde(default)]
    pub interrupted_workflow: Option<String>,
}

impl OrchestratorState {
    pub fn new(user_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            summary: String::new(),
            memory: UserMemory::default(),
            events: Vec::new(),
            user_id: user_id.into(),
            thread_id: thread_id.into(),
            memory_init_done: false,
            last_memory_update_index: 0,
            needs_plan_execute: false,
            plan_execute_task: None,
            interrupted_workflow: None,
        }
    }

    /// Invariant check used by tests and by the runtime after every reducer
    /// application (spec §3 "Invariants").
    pub fn check_invariants(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        let unique_ids = self.messages.iter().all(|m| seen.insert(m.id));
        unique_ids
            && self.last_memory_update_index <= self.messages.len()
            && self.events.len() <= EVENTS_CAP
    }
}
