//! Graph builder and compiled execution (spec §4.4 "Graph runtime (C4)").
//!
//! Grounded on `mofa-kernel::workflow::graph`'s `StateGraph`/`CompiledGraph`
//! traits, narrowed to the fixed [`OrchestratorState`] this crate operates
//! on. Conditional routing is carried by the [`Command`] a node returns
//! (its `control` field) rather than a separate predicate registered on
//! the edge, so "conditional edges" and "Send fan-out" (spec §4.4) are
//! both expressed through [`ControlFlow`].

use super::checkpoint::CheckpointStore;
use super::command::{Checkpoint, Command, ControlFlow, NodeOutcome, StateUpdate};
use super::node::Node;
use super::state::OrchestratorState;
use super::GraphError;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

pub const START: &str = "__start__";
pub const END: &str = "__end__";

/// Default node-activation bound for the top-level orchestrator graph
/// (spec §8 "`recursion_limit` exactly bounds node activations").
pub const DEFAULT_RECURSION_LIMIT: u32 = 50;

/// Default bound for a plan-execute subgraph run (spec §4.5).
pub const SUBGRAPH_RECURSION_LIMIT: u32 = 25;

pub struct GraphBuilder {
    name: String,
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: HashMap<String, String>,
    entry: Option<String>,
    recursion_limit: u32,
    checkpoints: Option<Arc<CheckpointStore>>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            checkpoints: None,
        }
    }

    /// Attaches a checkpoint store: every node activation within a run
    /// persists the resulting state, keyed on `state.thread_id` (spec §4.4
    /// "checkpointing occurs after every node"). Without one, `invoke`/
    /// `resume` run purely in memory (used by tests and the `plan_execute`
    /// subgraph, which rides on its parent's checkpoints instead).
    pub fn with_checkpoint_store(mut self, checkpoints: Arc<CheckpointStore>) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    pub fn add_node(mut self, id: impl Into<String>, node: Arc<dyn Node>) -> Self {
        self.nodes.insert(id.into(), node);
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.insert(from.into(), to.into());
        self
    }

    pub fn set_entry_point(mut self, node: impl Into<String>) -> Self {
        self.entry = Some(node.into());
        self
    }

    pub fn with_recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Validates the graph structure and produces an executable form.
    pub fn compile(self) -> Result<CompiledGraph, GraphError> {
        let entry = self
            .entry
            .ok_or_else(|| GraphError::InvalidGraph("no entry point set".into()))?;

        if !self.nodes.contains_key(&entry) {
            return Err(GraphError::InvalidGraph(format!("entry point {entry} is not a registered node")));
        }
        for (from, to) in &self.edges {
            if to != END && !self.nodes.contains_key(to) {
                return Err(GraphError::InvalidGraph(format!("edge {from} -> {to}: {to} is not a registered node")));
            }
        }

        Ok(CompiledGraph {
            name: self.name,
            nodes: self.nodes,
            edges: self.edges,
            entry,
            recursion_limit: self.recursion_limit,
            checkpoints: self.checkpoints,
        })
    }
}

pub struct CompiledGraph {
    name: String,
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: HashMap<String, String>,
    entry: String,
    recursion_limit: u32,
    checkpoints: Option<Arc<CheckpointStore>>,
}

/// Outcome of a single node activation within a run.
pub struct StepResult {
    pub node_id: String,
    pub state: OrchestratorState,
    pub is_complete: bool,
}

impl CompiledGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn apply_updates(state: &mut OrchestratorState, updates: Vec<StateUpdate>) {
        for update in updates {
            match update {
                StateUpdate::Messages(messages) => {
                    super::reducer::reduce_messages(&mut state.messages, messages)
                }
                StateUpdate::Events(events) => super::reducer::reduce_events(&mut state.events, events),
                StateUpdate::Summary(summary) => state.summary = summary,
                StateUpdate::MemoryInitDone(done) => state.memory_init_done = done,
                StateUpdate::LastMemoryUpdateIndex(index) => state.last_memory_update_index = index,
                StateUpdate::NeedsPlanExecute(flag) => state.needs_plan_execute = flag,
                StateUpdate::PlanExecuteTask(task) => state.plan_execute_task = task,
                StateUpdate::Memory(memory) => state.memory = memory,
                StateUpdate::InterruptedWorkflow(entry) => state.interrupted_workflow = entry,
            }
        }
    }

    async fn run_node(&self, node_id: &str, state: &OrchestratorState) -> Result<NodeOutcome, GraphError> {
        let node = self
            .nodes
            .get(node_id)
            .ok_or_else(|| GraphError::UnknownNode(node_id.to_string()))?;
        Ok(node.run(state).await)
    }

    /// Runs the graph to completion from `input`, enforcing the
    /// recursion limit (spec §8 "the (limit+1)-th fails").
    pub async fn invoke(&self, input: OrchestratorState) -> Result<OrchestratorState, GraphError> {
        self.run_from(&self.entry, input).await
    }

    /// Resumes a previously suspended run (spec §4.4 "Interruption &
    /// resume"): `state` is the checkpointed state with the caller's
    /// response folded in (e.g. `plan_execute_task.approved` set), and
    /// execution re-enters at the node that suspended. Interrupts raised
    /// inside a subgraph propagate transparently because the subgraph node
    /// itself re-runs and re-suspends/re-completes exactly as any node.
    pub async fn resume(&self, checkpoint: Checkpoint, state: OrchestratorState) -> Result<OrchestratorState, GraphError> {
        let _ = checkpoint.thread_id;
        self.run_from(&checkpoint.node_id, state).await
    }

    /// Persists `state` if a checkpoint store is attached, logging rather
    /// than failing the step on a [`StoreError`](crate::store::StoreError)
    /// (spec §7 "PersistenceError: recorded; in-memory state continues to
    /// reflect writes").
    async fn checkpoint(&self, state: &OrchestratorState) {
        if let Some(checkpoints) = &self.checkpoints {
            if let Err(err) = checkpoints.save(state).await {
                tracing::warn!(thread_id = %state.thread_id, error = %err, "checkpoint write failed");
            }
        }
    }

    async fn run_from(&self, start: &str, input: OrchestratorState) -> Result<OrchestratorState, GraphError> {
        let mut state = input;
        let mut current = start.to_string();
        let mut activations = 0u32;

        loop {
            if current == END {
                return Ok(state);
            }
            activations += 1;
            if activations > self.recursion_limit {
                return Err(GraphError::RecursionExceeded(self.recursion_limit));
            }

            let outcome = self.run_node(&current, &state).await?;
            match outcome {
                NodeOutcome::Completed(command) => {
                    let control = command.control_or_continue();
                    Self::apply_updates(&mut state, command.updates);
                    self.checkpoint(&state).await;

                    match control {
                        ControlFlow::Continue => {
                            current = self.edges.get(&current).cloned().unwrap_or_else(|| END.to_string());
                        }
                        ControlFlow::Goto(target) => {
                            if !self.nodes.contains_key(&target) && target != END {
                                return Err(GraphError::UnknownNode(target));
                            }
                            current = target;
                        }
                        ControlFlow::Send(targets) => {
                            let branches = targets.into_iter().map(|send| {
                                let state = state.clone();
                                async move {
                                    let outcome = self.run_node(&send.target, &state).await;
                                    (send, outcome)
                                }
                            });
                            for (send, outcome) in join_all(branches).await {
                                match outcome? {
                                    NodeOutcome::Completed(command) => {
                                        Self::apply_updates(&mut state, command.updates);
                                    }
                                    NodeOutcome::Failed(err) => {
                                        return Err(GraphError::NodeFailed { node: send.target, source: err });
                                    }
                                    NodeOutcome::Cancelled => return Err(GraphError::Cancelled),
                                    NodeOutcome::Suspended { .. } => {
                                        return Err(GraphError::InvalidGraph(format!(
                                            "branch {} suspended; suspension is not supported inside a Send fan-out",
                                            send.target
                                        )));
                                    }
                                }
                            }
                            self.checkpoint(&state).await;
                            current = self.edges.get(&current).cloned().unwrap_or_else(|| END.to_string());
                        }
                        ControlFlow::Return => return Ok(state),
                    }
                }
                NodeOutcome::Suspended { prompt, checkpoint } => {
                    return Err(GraphError::Interrupted { prompt, checkpoint });
                }
                NodeOutcome::Cancelled => return Err(GraphError::Cancelled),
                NodeOutcome::Failed(err) => {
                    return Err(GraphError::NodeFailed { node: current, source: err });
                }
            }
        }
    }

    /// Runs a single node activation, useful for debugging or interactive
    /// stepping.
    pub async fn step(&self, node_id: &str, state: OrchestratorState) -> Result<StepResult, GraphError> {
        let outcome = self.run_node(node_id, &state).await?;
        let mut state = state;
        let is_complete = match outcome {
            NodeOutcome::Completed(command) => {
                let control = command.control_or_continue();
                Self::apply_updates(&mut state, command.updates);
                matches!(control, ControlFlow::Return) || node_id == END
            }
            NodeOutcome::Suspended { prompt, checkpoint } => {
                return Err(GraphError::Interrupted { prompt, checkpoint });
            }
            NodeOutcome::Cancelled => return Err(GraphError::Cancelled),
            NodeOutcome::Failed(err) => {
                return Err(GraphError::NodeFailed { node: node_id.to_string(), source: err });
            }
        };
        Ok(StepResult { node_id: node_id.to_string(), state, is_complete })
    }
}
