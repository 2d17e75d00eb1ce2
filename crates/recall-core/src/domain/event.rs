//! Host lifecycle events.
//!
//! Hosts deliver events as JSON objects tagged by an `"event"` field. They
//! are narrowed into [`LifecycleEvent`] once, at the boundary, so handlers
//! only ever see typed payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ValidationError;

/// One lifecycle notification from the agent host.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    SessionStart,
    BeforeAgentStart(BeforeAgentStart),
    AgentEnd(AgentEnd),
    SessionEnd,
    BeforeCompaction,
    AfterCompaction,
}

impl LifecycleEvent {
    /// Wire name of the event, also used as the log context.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::SessionStart => "session_start",
            LifecycleEvent::BeforeAgentStart(_) => "before_agent_start",
            LifecycleEvent::AgentEnd(_) => "agent_end",
            LifecycleEvent::SessionEnd => "session_end",
            LifecycleEvent::BeforeCompaction => "before_compaction",
            LifecycleEvent::AfterCompaction => "after_compaction",
        }
    }

    /// Validate a raw host payload.
    ///
    /// Unknown fields are ignored; an unknown or missing `"event"` tag is an
    /// error.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let name = value
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::Malformed("missing \"event\" field".to_string()))?
            .to_string();

        let malformed = |e: serde_json::Error| ValidationError::Malformed(format!("{name}: {e}"));

        match name.as_str() {
            "session_start" => Ok(LifecycleEvent::SessionStart),
            "before_agent_start" => serde_json::from_value(value)
                .map(LifecycleEvent::BeforeAgentStart)
                .map_err(malformed),
            "agent_end" => serde_json::from_value(value)
                .map(LifecycleEvent::AgentEnd)
                .map_err(malformed),
            "session_end" => Ok(LifecycleEvent::SessionEnd),
            "before_compaction" => Ok(LifecycleEvent::BeforeCompaction),
            "after_compaction" => Ok(LifecycleEvent::AfterCompaction),
            _ => Err(ValidationError::UnknownEvent { event: name }),
        }
    }
}

/// Payload of `before_agent_start`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BeforeAgentStart {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Payload of `agent_end`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AgentEnd {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub messages: Vec<AgentMessage>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    #[default]
    #[serde(other)]
    Other,
}

/// A conversation message as reported by the host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentMessage {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub content: MessageContent,
}

/// Message content: a plain string or a list of typed blocks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

/// A content block; only `"text"` blocks carry text we look at.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl AgentMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Text segments of a user or assistant message; empty for other roles.
    pub fn texts(&self) -> Vec<&str> {
        if !matches!(self.role, Role::User | Role::Assistant) {
            return Vec::new();
        }
        match &self.content {
            MessageContent::Text(text) => vec![text.as_str()],
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter(|b| b.kind == "text")
                .filter_map(|b| b.text.as_deref())
                .collect(),
        }
    }
}

/// Reply to `before_agent_start` asking the host to inject context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    pub prepend_context: String,
}
