//! Structured user memory: background extraction, deduplicating merge,
//! dual-tier persistence (spec §3 "User Memory", §4.6).

pub mod context;
pub mod extraction;
pub mod merge;
pub mod types;

pub use context::context_string;
pub use extraction::{Extractor, NullExtractor};
pub use merge::merge;
pub use types::{Account, Case, Contact, Lead, MemoryEntity, Opportunity, Task, UserMemory};

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MemoryError {
    #[error("extraction failed: {0}")]
    Extraction(String),
    #[error("memory persistence failed: {0}")]
    Persistence(String),
    #[error("memory serialization failed: {0}")]
    Serialization(String),
}

pub type MemoryResult<T> = Result<T, MemoryError>;
