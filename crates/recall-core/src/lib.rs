//! Recall Core Library
//!
//! Session memory orchestration for agent hosts: turns host lifecycle events
//! and tool calls into memory backend operations.
//!
//! ## Key Components
//!
//! - `Coordinator`: owns session state and the init gate, handles events
//! - `InitGate`: resolves the storage location and connects exactly once
//! - `detector`: keyword heuristics for decision-like utterances
//! - `render`: the injected `<session-memory>` block
//! - `checkpoint_policy`: auto-checkpoint staleness and summary text
//! - `tools`: search / save / load_checkpoint / update

pub mod checkpoint_policy;
pub mod coordinator;
pub mod detector;
pub mod domain;
pub mod init_gate;
pub mod obs;
pub mod render;
pub mod session;
pub mod telemetry;
pub mod tools;

pub use coordinator::{Clock, Coordinator};
pub use detector::is_candidate_decision;
pub use domain::{
    AgentEnd, AgentMessage, BeforeAgentStart, HookOutput, LifecycleEvent, RecallConfig,
    RecallError, Result, ValidationError,
};
pub use init_gate::InitGate;
pub use obs::{LogLevel, LogSink, RecordingSink, TracingSink};
pub use render::{format_reasoning, render_memory_context, INJECTED_CONTEXT_MARKER};
pub use session::SessionState;
pub use telemetry::{init_tracing, LogFormat};
pub use tools::{ToolCall, ERROR_PREFIX};

pub use recall_state::{
    Checkpoint, MemoryRecord, MemoryStore, Outcome, StateError, StoreConnector, SurrealConnector,
    SurrealMemoryStore,
};

/// Recall version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
