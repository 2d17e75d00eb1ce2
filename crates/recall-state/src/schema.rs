//! Record shapes exchanged with the memory store
//!
//! - `MemoryRecord`: a persisted decision (topic / decision / reasoning)
//! - `Checkpoint`: a session-resumption snapshot
//! - `Outcome`: how a decision turned out

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StateError;

/// How a recorded decision played out.
///
/// Canonical form is lowercase, both on the wire and in rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
    Partial,
    Pending,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failed => "failed",
            Outcome::Partial => "partial",
            Outcome::Pending => "pending",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = StateError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Outcome::Success),
            "failed" => Ok(Outcome::Failed),
            "partial" => Ok(Outcome::Partial),
            "pending" => Ok(Outcome::Pending),
            other => Err(StateError::InvalidInput(format!("unknown outcome: {other}"))),
        }
    }
}

/// A decision record as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub topic: String,
    pub decision: String,
    pub reasoning: String,
    /// Author's confidence in the decision (0.0 - 1.0)
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub outcome: Option<Outcome>,
    /// Only present on search results (0.0 - 1.0)
    #[serde(default)]
    pub similarity: Option<f32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub limitation: Option<String>,
}

impl MemoryRecord {
    /// Create a record with the required fields; everything else unset.
    pub fn new(
        id: impl Into<String>,
        topic: impl Into<String>,
        decision: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            decision: decision.into(),
            reasoning: reasoning.into(),
            confidence: None,
            outcome: None,
            similarity: None,
            created_at: None,
            failure_reason: None,
            limitation: None,
        }
    }

    pub fn with_similarity(mut self, similarity: f32) -> Self {
        self.similarity = Some(similarity);
        self
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// A persisted session-resumption snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub summary: String,
    #[serde(default)]
    pub next_steps: Option<String>,
    #[serde(default)]
    pub open_files: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(id: impl Into<String>, summary: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            next_steps: None,
            open_files: Vec::new(),
            timestamp,
        }
    }

    pub fn with_next_steps(mut self, next_steps: impl Into<String>) -> Self {
        self.next_steps = Some(next_steps.into());
        self
    }
}
