//! Structured-entity extraction contract (spec §4.6 "Extraction contract").
//!
//! The orchestrator does not embed a language model; extraction is an
//! external collaborator reached through this trait, the same way the
//! runtime treats `LLMProvider` as a pluggable boundary.

use super::types::UserMemory;
use super::MemoryResult;
use crate::graph::state::ChatMessage;
use async_trait::async_trait;

/// Produces a fresh [`UserMemory`] containing only entities *explicitly*
/// mentioned in `messages`.
///
/// Invariants the implementation must uphold: never invent identifiers,
/// preserve external ids verbatim when present, preserve relational links
/// by id or name (spec §4.6).
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, messages: &[ChatMessage]) -> MemoryResult<UserMemory>;
}

/// An extractor that never finds anything, used where no LM-backed
/// extractor has been wired up (tests, local development without a
/// configured provider).
#[derive(Debug, Default)]
pub struct NullExtractor;

#[async_trait]
impl Extractor for NullExtractor {
    fn name(&self) -> &str {
        "null"
    }

    async fn extract(&self, _messages: &[ChatMessage]) -> MemoryResult<UserMemory> {
        Ok(UserMemory::default())
    }
}

fn _takes_extractor(_: std::sync::Arc<dyn Extractor>) {}
