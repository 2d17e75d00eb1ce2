//! Domain models for Recall.
//!
//! Canonical definitions for:
//! - `LifecycleEvent`: typed host lifecycle notifications
//! - `RecallConfig`: plugin configuration and storage resolution
//! - `RecallError` / `ValidationError`: error taxonomy

pub mod config;
pub mod error;
pub mod event;

// Re-export main types and errors
pub use config::{resolve_storage_path, RecallConfig, STORAGE_PATH_ENV};
pub use error::{RecallError, Result, ValidationError};
pub use event::{
    AgentEnd, AgentMessage, BeforeAgentStart, ContentBlock, HookOutput, LifecycleEvent,
    MessageContent, Role,
};
