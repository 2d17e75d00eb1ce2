//! Storage trait definitions for Recall
//!
//! These traits define the boundary to the memory backend:
//! - `MemoryStore`: search, save, checkpoint, list and outcome updates
//! - `StoreConnector`: builds a `MemoryStore` for a storage location
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::schema::{Checkpoint, MemoryRecord, Outcome};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StateError>;

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

/// Options for a similarity search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum number of results
    pub limit: usize,
    /// Minimum similarity (0.0 - 1.0) a result must reach
    pub threshold: f32,
}

impl SearchOptions {
    pub fn new(limit: usize, threshold: f32) -> Self {
        Self { limit, threshold }
    }
}

/// Results of a similarity search, best match first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<MemoryRecord>,
}

/// A new decision to persist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub topic: String,
    pub decision: String,
    pub reasoning: String,
    pub confidence: f32,
    /// Record kind; always "decision" for now
    pub kind: String,
}

impl SaveRequest {
    pub fn decision(
        topic: impl Into<String>,
        decision: impl Into<String>,
        reasoning: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            topic: topic.into(),
            decision: decision.into(),
            reasoning: reasoning.into(),
            confidence,
            kind: "decision".to_string(),
        }
    }
}

/// What the store reports back after a save
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub id: String,
    #[serde(default)]
    pub similar_decisions: Vec<MemoryRecord>,
    #[serde(default)]
    pub warning: Option<String>,
    #[serde(default)]
    pub collaboration_hint: Option<String>,
}

/// Outcome update for an existing decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeUpdate {
    pub outcome: Outcome,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub limitation: Option<String>,
}

impl OutcomeUpdate {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            failure_reason: None,
            limitation: None,
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Semantic memory backend.
///
/// Guarantees:
/// - `search` results are ordered by similarity (descending) and never
///   carry a similarity below `threshold`.
/// - `list` returns records newest first.
/// - `load_checkpoint` returns the most recently saved checkpoint.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Similarity search. `None` when the store declines the query (e.g. blank).
    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> StorageResult<Option<SearchResponse>>;

    /// Persist a decision record.
    async fn save(&self, request: SaveRequest) -> StorageResult<SaveReceipt>;

    /// Persist a checkpoint and return its ID.
    async fn save_checkpoint(
        &self,
        summary: &str,
        open_files: &[String],
        next_steps: &str,
    ) -> StorageResult<String>;

    /// Latest checkpoint, if any.
    async fn load_checkpoint(&self) -> StorageResult<Option<Checkpoint>>;

    /// Most recent decision records, newest first.
    async fn list(&self, limit: usize) -> StorageResult<Vec<MemoryRecord>>;

    /// Record how a decision turned out. `NotFound` if the ID is unknown.
    async fn update_outcome(&self, id: &str, update: OutcomeUpdate) -> StorageResult<()>;
}

/// Builds a `MemoryStore` for a resolved storage location.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, location: &Path) -> StorageResult<Arc<dyn MemoryStore>>;
}

// ---------------------------------------------------------------------------
// Lexical similarity
// ---------------------------------------------------------------------------

fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Fraction of distinct query terms that occur in `document` (0.0 - 1.0).
///
/// Deterministic stand-in for embedding similarity, used by the bundled
/// store adapters.
pub fn lexical_similarity(query: &str, document: &str) -> f32 {
    let mut query_terms = terms(query);
    query_terms.sort();
    query_terms.dedup();
    if query_terms.is_empty() {
        return 0.0;
    }

    let doc_terms = terms(document);
    let hits = query_terms
        .iter()
        .filter(|q| doc_terms.iter().any(|d| d == *q))
        .count();

    hits as f32 / query_terms.len() as f32
}

/// Text a record is scored against.
pub fn searchable_text(record: &MemoryRecord) -> String {
    format!("{} {} {}", record.topic, record.decision, record.reasoning)
}

/// Same-topic records at or above this score are reported as similar on save.
pub const SIMILAR_DECISION_THRESHOLD: f32 = 0.5;
/// Same-topic records at or above this score trigger a near-duplicate warning.
pub const DUPLICATE_DECISION_THRESHOLD: f32 = 0.9;

/// Build the receipt for a save of `request` given the records already stored.
///
/// Only records on the same topic (case-insensitive) are compared.
pub fn assess_save(existing: &[MemoryRecord], request: &SaveRequest, id: String) -> SaveReceipt {
    let probe = format!("{} {}", request.decision, request.reasoning);
    let mut similar: Vec<MemoryRecord> = existing
        .iter()
        .filter(|r| r.topic.eq_ignore_ascii_case(&request.topic))
        .filter_map(|r| {
            let score = lexical_similarity(&probe, &searchable_text(r));
            (score >= SIMILAR_DECISION_THRESHOLD).then(|| r.clone().with_similarity(score))
        })
        .collect();
    similar.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));

    let warning = similar
        .iter()
        .find(|r| r.similarity.unwrap_or(0.0) >= DUPLICATE_DECISION_THRESHOLD)
        .map(|r| format!("Near-duplicate of decision {} on topic '{}'", r.id, r.topic));

    let collaboration_hint = similar.first().map(|r| {
        format!(
            "Related decisions exist on '{}'; reference one with builds_on: {} or debates: {} in the reasoning",
            r.topic, r.id, r.id
        )
    });

    SaveReceipt {
        id,
        similar_decisions: similar,
        warning,
        collaboration_hint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assess_save_flags_same_topic_only() {
        let existing = vec![
            MemoryRecord::new("d1", "auth", "use JWT tokens", "stateless sessions"),
            MemoryRecord::new("d2", "billing", "use JWT tokens", "stateless sessions"),
        ];
        let req = SaveRequest::decision("Auth", "use JWT tokens", "stateless sessions", 0.8);
        let receipt = assess_save(&existing, &req, "d3".into());

        assert_eq!(receipt.id, "d3");
        assert_eq!(receipt.similar_decisions.len(), 1);
        assert_eq!(receipt.similar_decisions[0].id, "d1");
        assert!(receipt.warning.as_deref().unwrap().contains("d1"));
        assert!(receipt.collaboration_hint.as_deref().unwrap().contains("builds_on: d1"));
    }

    #[test]
    fn test_assess_save_unrelated_has_no_hints() {
        let existing = vec![MemoryRecord::new("d1", "auth", "use JWT", "stateless")];
        let req = SaveRequest::decision("auth", "rotate keys monthly", "compliance", 0.8);
        let receipt = assess_save(&existing, &req, "d2".into());

        assert!(receipt.similar_decisions.is_empty());
        assert!(receipt.warning.is_none());
        assert!(receipt.collaboration_hint.is_none());
    }

    #[test]
    fn test_lexical_similarity_full_and_partial() {
        assert_eq!(lexical_similarity("auth", "auth use JWT tokens"), 1.0);
        assert_eq!(lexical_similarity("auth cache", "auth use JWT tokens"), 0.5);
        assert_eq!(lexical_similarity("billing", "auth use JWT tokens"), 0.0);
    }

    #[test]
    fn test_lexical_similarity_ignores_case_and_repeats() {
        assert_eq!(lexical_similarity("Auth AUTH auth", "the auth layer"), 1.0);
    }

    #[test]
    fn test_lexical_similarity_blank_query() {
        assert_eq!(lexical_similarity("  ", "anything"), 0.0);
        assert_eq!(lexical_similarity("a", "a b c"), 0.0);
    }

    #[test]
    fn test_save_request_defaults_kind() {
        let req = SaveRequest::decision("db", "use postgres", "mature", 0.8);
        assert_eq!(req.kind, "decision");
    }
}
