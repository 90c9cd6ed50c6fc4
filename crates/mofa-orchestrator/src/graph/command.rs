//! Routing directives and node outcomes.
//!
//! Grounded on `mofa-kernel::workflow::command`'s `Command`/`ControlFlow`
//! shape for the routing half. Per design note §9 "Exceptions-for-control-
//! flow", node functions return a distinct [`NodeOutcome`] sum type
//! (`Completed`/`Suspended`/`Cancelled`/`Failed`) rather than raising an
//! exception to suspend — `Command` only ever carries the *routing*
//! decision once a node has completed.

use super::state::{ChatMessage, OrchestratorEvent};
use serde::{Deserialize, Serialize};

/// A partial state update targeting one declared reducer.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    Messages(Vec<ChatMessage>),
    Summary(String),
    Events(Vec<OrchestratorEvent>),
    MemoryInitDone(bool),
    LastMemoryUpdateIndex(usize),
    NeedsPlanExecute(bool),
    PlanExecuteTask(Option<super::state::PlanExecuteTask>),
    Memory(crate::memory::UserMemory),
    InterruptedWorkflow(Option<String>),
}

/// Where execution goes after the current node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFlow {
    /// Proceed along the statically or conditionally wired edge.
    Continue,
    /// Jump directly to a named node, bypassing the static edge.
    Goto(String),
    /// Fan out to multiple nodes concurrently with their own sub-states
    /// (spec §4.4 "Conditional edges", "Send").
    Send(Vec<SendTarget>),
    /// Terminate the run.
    Return,
}

/// One branch of a `Send` fan-out (spec GLOSSARY "Send").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTarget {
    pub target: String,
    pub branch_id: String,
}

/// The routing + state-update directive returned by a node on normal
/// completion.
#[derive(Debug, Clone, Default)]
pub struct Command {
    pub updates: Vec<StateUpdateKind>,
    pub control: Option<ControlFlowKind>,
}

/// Boxed-free representation kept separate from [`StateUpdate`]/
/// [`ControlFlow`] so `Command` can derive `Default` without requiring
/// those enums to.
pub type StateUpdateKind = StateUpdate;
pub type ControlFlowKind = ControlFlow;

impl Command {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_update(mut self, update: StateUpdate) -> Self {
        self.updates.push(update);
        self
    }

    pub fn with_control(mut self, control: ControlFlow) -> Self {
        self.control = Some(control);
        self
    }

    pub fn goto(target: impl Into<String>) -> Self {
        Self {
            updates: Vec::new(),
            control: Some(ControlFlow::Goto(target.into())),
        }
    }

    pub fn send(targets: Vec<SendTarget>) -> Self {
        Self {
            updates: Vec::new(),
            control: Some(ControlFlow::Send(targets)),
        }
    }

    pub fn return_() -> Self {
        Self {
            updates: Vec::new(),
            control: Some(ControlFlow::Return),
        }
    }

    pub fn control_or_continue(&self) -> ControlFlow {
        self.control.clone().unwrap_or(ControlFlow::Continue)
    }
}

/// A checkpointed suspension point: a human-in-the-loop prompt plus the
/// state at the moment of suspension (spec §4.4 "Interruption & resume").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub node_id: String,
    pub state: super::state::OrchestratorState,
}

/// The result of running a single node (design note §9
/// "Exceptions-for-control-flow"): distinct from [`Command`], which only
/// describes the routing decision once a node *completes* normally.
pub enum NodeOutcome {
    /// The node ran to completion; apply `command` and continue routing.
    Completed(Command),
    /// The node wants to suspend the run and surface `prompt` to the
    /// caller; `checkpoint` captures the state to resume from.
    Suspended { prompt: String, checkpoint: Box<Checkpoint> },
    /// The node observed a cooperative cancellation request.
    Cancelled,
    /// The node failed; the step terminates with this error.
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_defaults_to_continue() {
        let cmd = Command::new();
        assert_eq!(cmd.control_or_continue(), ControlFlow::Continue);
    }

    #[test]
    fn goto_sets_control_flow() {
        let cmd = Command::goto("chatbot");
        assert_eq!(cmd.control_or_continue(), ControlFlow::Goto("chatbot".into()));
    }

    #[test]
    fn send_carries_branch_targets() {
        let cmd = Command::send(vec![
            SendTarget { target: "summarize_conversation".into(), branch_id: "b1".into() },
            SendTarget { target: "update_memory".into(), branch_id: "b2".into() },
        ]);
        match cmd.control_or_continue() {
            ControlFlow::Send(targets) => assert_eq!(targets.len(), 2),
            _ => panic!("expected Send"),
        }
    }
}
