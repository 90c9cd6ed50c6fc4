//! Node function contract (spec §4.4 "Nodes").
//!
//! Grounded on `mofa-kernel::workflow::graph::NodeFunc`, narrowed to the
//! fixed [`OrchestratorState`] type this crate operates on rather than a
//! generic state parameter.

use super::command::NodeOutcome;
use super::state::OrchestratorState;
use async_trait::async_trait;

#[async_trait]
pub trait Node: Send + Sync {
    /// Runs the node against a snapshot of the current state, returning
    /// an outcome describing how execution should proceed.
    async fn run(&self, state: &OrchestratorState) -> NodeOutcome;

    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }
}

fn _takes_node(_: Box<dyn Node>) {}
