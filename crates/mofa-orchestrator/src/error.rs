//! Crate-level error type.
//!
//! Mirrors the teacher's `KernelError` pattern: each sub-module owns a
//! `thiserror::Error` leaf enum, and [`OrchestratorError`] composes them via
//! `#[from]` so the `?` operator converts automatically. Use
//! [`OrchestratorResult`] (backed by [`error_stack::Report`]) to attach
//! human-readable context as errors propagate up the call stack.

use thiserror::Error;

use crate::a2a::TransportError;
use crate::graph::GraphError;
use crate::memory::MemoryError;
use crate::registry::RegistryError;
use crate::resilience::ResilienceError;
use crate::store::StoreError;

/// Crate-level error type for `mofa-orchestrator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrchestratorError {
    /// An error from the resilience layer (circuit breaker / retry).
    #[error("resilience error: {0}")]
    Resilience(#[from] ResilienceError),

    /// An error from the A2A transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An error from the durable store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An error from the graph runtime.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// An error from the memory subsystem.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    /// An error from the agent registry.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A configuration error.
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// An internal / untyped error described by a message string.
    #[error("{0}")]
    Internal(String),
}

/// Convenience result alias using [`error_stack::Report`].
pub type OrchestratorResult<T> = Result<T, error_stack::Report<OrchestratorError>>;
