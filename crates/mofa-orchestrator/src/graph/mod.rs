//! Stateful directed graph runtime (spec §4.4 "Graph runtime (C4)").

pub mod builder;
pub mod checkpoint;
pub mod command;
pub mod node;
pub mod reducer;
pub mod state;

pub use builder::{CompiledGraph, GraphBuilder, StepResult, DEFAULT_RECURSION_LIMIT, END, START, SUBGRAPH_RECURSION_LIMIT};
pub use checkpoint::CheckpointStore;
pub use command::{Checkpoint, Command, ControlFlow, NodeOutcome, SendTarget, StateUpdate};
pub use node::Node;
pub use state::{ChatMessage, MessageRole, OrchestratorEvent, OrchestratorState, PlanExecuteTask};

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GraphError {
    #[error("graph is misconfigured: {0}")]
    InvalidGraph(String),
    #[error("unknown node: {0}")]
    UnknownNode(String),
    #[error("recursion limit ({0}) exceeded")]
    RecursionExceeded(u32),
    #[error("node {node} failed: {source}")]
    NodeFailed {
        node: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("run interrupted: {prompt}")]
    Interrupted {
        prompt: String,
        checkpoint: Box<Checkpoint>,
    },
    #[error("run cancelled")]
    Cancelled,
}
