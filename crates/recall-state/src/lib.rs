//! Recall-State: memory backend boundary for Recall
//!
//! This crate owns everything on the far side of the memory boundary: the
//! record shapes, the `MemoryStore` capability the orchestration core talks
//! to, and the concrete stores behind it.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: a small, async, backend-agnostic contract.
//!
//! ## Key Components
//!
//! - `MemoryStore`: search / save / checkpoint / list / outcome update
//! - `StoreConnector`: resolves a storage location into a `MemoryStore`
//! - `SurrealMemoryStore`: SurrealDB implementation (SurrealKV on disk)
//! - `fakes`: in-memory implementations with failure injection

mod error;
pub mod fakes;
mod handle;
mod schema;
pub mod storage_traits;

pub use error::StateError;
pub use handle::{SurrealConnector, SurrealMemoryStore, IN_MEMORY_LOCATION};
pub use schema::{Checkpoint, MemoryRecord, Outcome};
pub use storage_traits::{
    lexical_similarity, MemoryStore, OutcomeUpdate, SaveReceipt, SaveRequest, SearchOptions,
    SearchResponse, StorageResult, StoreConnector,
};

/// Result type for recall-state operations
pub type Result<T> = std::result::Result<T, StateError>;
