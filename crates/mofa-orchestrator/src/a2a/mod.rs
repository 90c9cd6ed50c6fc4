//! A2A (agent-to-agent) transport: JSON-RPC 2.0 over HTTP POST
//! (spec §4.2 "A2A transport (C2)").

pub mod client;
pub mod jsonrpc;
pub mod server;
pub mod types;

pub use client::{A2aClient, PoolLimits};
pub use server::{A2aServer, Handler};
pub use types::{AgentCard, Artifact, Task, TaskResult, TaskStatus};

use crate::resilience::{Classify, ResilienceError};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned 5xx: {0}")]
    Upstream5xx(u16),
    #[error("upstream returned 4xx: {0}")]
    Upstream4xx(u16),
    #[error("jsonrpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("failed to deserialize response: {0}")]
    Deserialize(String),
    #[error("circuit open for endpoint")]
    CircuitOpen,
    #[error("call timed out")]
    Timeout,
}

impl TransportError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }

    /// Unwraps the resilience layer's envelope back into a [`TransportError`]
    /// so callers only ever see transport-level variants.
    pub(crate) fn from_resilience(err: ResilienceError) -> Self {
        match err {
            ResilienceError::CircuitOpen { .. } => Self::CircuitOpen,
            ResilienceError::Timeout { .. } => Self::Timeout,
            ResilienceError::Operation { source, .. } => {
                match source.downcast::<TransportError>() {
                    Ok(inner) => *inner,
                    Err(other) => Self::Transport(other.to_string()),
                }
            }
        }
    }
}

impl Classify for TransportError {
    /// Transient transport errors and 5xx are retried; 4xx, circuit-open,
    /// and malformed responses are not (spec §4.1, §7 error taxonomy).
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Upstream5xx(_) | Self::Timeout)
    }
}
