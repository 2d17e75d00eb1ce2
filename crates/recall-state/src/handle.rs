//! SurrealDB-backed memory store
//!
//! Manages the connection and implements `MemoryStore` on two schemaless
//! tables:
//! - memories: decision records
//! - checkpoints: session-resumption snapshots
//!
//! Supports an on-disk SurrealKV database (normal use) and an in-memory
//! database (`mem://`, tests).

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::StateError;
use crate::schema::{Checkpoint, MemoryRecord, Outcome};
use crate::storage_traits::*;

const NAMESPACE: &str = "recall";
const DATABASE: &str = "memory";

/// Location string that selects the in-memory engine.
pub const IN_MEMORY_LOCATION: &str = "mem://";

const MEMORY_FIELDS: &str = "memory_id, topic, decision, reasoning, confidence, outcome, \
                             failure_reason, limitation, created_at_ms, seq";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbMemory {
    memory_id: String,
    topic: String,
    decision: String,
    reasoning: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    outcome: Option<String>,
    #[serde(default)]
    failure_reason: Option<String>,
    #[serde(default)]
    limitation: Option<String>,
    created_at_ms: i64,
    #[serde(default)]
    seq: i64,
}

impl DbMemory {
    fn into_record(self) -> MemoryRecord {
        MemoryRecord {
            id: self.memory_id,
            topic: self.topic,
            decision: self.decision,
            reasoning: self.reasoning,
            confidence: self.confidence.map(|c| c as f32),
            outcome: self.outcome.and_then(|o| o.parse::<Outcome>().ok()),
            similarity: None,
            created_at: DateTime::from_timestamp_millis(self.created_at_ms),
            failure_reason: self.failure_reason,
            limitation: self.limitation,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[allow(dead_code)]
    memory_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbCheckpoint {
    checkpoint_id: String,
    summary: String,
    #[serde(default)]
    next_steps: Option<String>,
    #[serde(default)]
    open_files: Vec<String>,
    created_at_ms: i64,
    #[serde(default)]
    seq: i64,
}

impl DbCheckpoint {
    fn into_checkpoint(self) -> Checkpoint {
        Checkpoint {
            id: self.checkpoint_id,
            summary: self.summary,
            next_steps: self.next_steps,
            open_files: self.open_files,
            timestamp: DateTime::from_timestamp_millis(self.created_at_ms).unwrap_or_default(),
        }
    }
}

/// SurrealDB connection implementing [`MemoryStore`]
///
/// Rows are ordered by `created_at_ms`, then by a per-connection write
/// sequence. Rows sharing a millisecond always come from one connection,
/// so the sequence fully orders them.
#[derive(Clone)]
pub struct SurrealMemoryStore {
    db: Surreal<Any>,
    seq: Arc<AtomicI64>,
}

impl SurrealMemoryStore {
    /// Connect to an in-memory database and set up schema
    #[instrument(skip_all)]
    pub async fn setup_in_memory() -> Result<Self, StateError> {
        Self::connect_url(IN_MEMORY_LOCATION).await
    }

    /// Open (or create) the on-disk database at `path`
    #[instrument(skip(path), fields(path = %path.display()))]
    pub async fn open(path: &Path) -> Result<Self, StateError> {
        tokio::fs::create_dir_all(path).await.map_err(|e| {
            StateError::Connection(format!("Failed to create {}: {}", path.display(), e))
        })?;
        Self::connect_url(&format!("surrealkv://{}", path.display())).await
    }

    async fn connect_url(url: &str) -> Result<Self, StateError> {
        info!("Connecting to SurrealDB at {}", url);

        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        let store = SurrealMemoryStore {
            db,
            seq: Arc::new(AtomicI64::new(0)),
        };
        store.init_schema().await?;

        info!("SurrealDB connected and schema initialized");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StateError> {
        let schema = r#"
            DEFINE TABLE IF NOT EXISTS memories SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS idx_memory_id ON memories FIELDS memory_id UNIQUE;
            DEFINE INDEX IF NOT EXISTS idx_memory_created ON memories FIELDS created_at_ms, seq;

            DEFINE TABLE IF NOT EXISTS checkpoints SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS idx_checkpoint_created ON checkpoints FIELDS created_at_ms, seq;
        "#;

        self.db
            .query(schema)
            .await
            .and_then(|r| r.check())
            .map_err(|e| StateError::Connection(format!("Schema setup failed: {}", e)))?;

        debug!("Schema initialized successfully");
        Ok(())
    }

    fn next_seq(&self) -> i64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    async fn all_memories(&self) -> Result<Vec<MemoryRecord>, StateError> {
        let mut result = self
            .db
            .query(format!("SELECT {MEMORY_FIELDS} FROM memories"))
            .await?;
        let rows: Vec<DbMemory> = result.take(0)?;
        Ok(rows.into_iter().map(DbMemory::into_record).collect())
    }
}

#[async_trait]
impl MemoryStore for SurrealMemoryStore {
    #[instrument(skip(self, options), fields(limit = options.limit))]
    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> StorageResult<Option<SearchResponse>> {
        if query.trim().is_empty() {
            return Ok(None);
        }

        let mut results: Vec<MemoryRecord> = self
            .all_memories()
            .await?
            .into_iter()
            .filter_map(|r| {
                let score = lexical_similarity(query, &searchable_text(&r));
                (score >= options.threshold && score > 0.0).then(|| r.with_similarity(score))
            })
            .collect();
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(options.limit);

        debug!(hits = results.len(), "search complete");
        Ok(Some(SearchResponse {
            query: query.to_string(),
            results,
        }))
    }

    #[instrument(skip(self, request), fields(topic = %request.topic))]
    async fn save(&self, request: SaveRequest) -> StorageResult<SaveReceipt> {
        if !(0.0..=1.0).contains(&request.confidence) {
            return Err(StateError::InvalidInput(
                "confidence must be between 0.0 and 1.0".to_string(),
            ));
        }

        let existing = self.all_memories().await?;
        let id = uuid::Uuid::new_v4().to_string();
        let receipt = assess_save(&existing, &request, id.clone());

        let row = DbMemory {
            memory_id: id,
            topic: request.topic,
            decision: request.decision,
            reasoning: request.reasoning,
            confidence: Some(request.confidence as f64),
            outcome: None,
            failure_reason: None,
            limitation: None,
            created_at_ms: Utc::now().timestamp_millis(),
            seq: self.next_seq(),
        };

        self.db
            .query("CREATE memories CONTENT $row RETURN NONE")
            .bind(("row", row))
            .await?
            .check()?;

        info!(id = %receipt.id, similar = receipt.similar_decisions.len(), "decision saved");
        Ok(receipt)
    }

    #[instrument(skip_all)]
    async fn save_checkpoint(
        &self,
        summary: &str,
        open_files: &[String],
        next_steps: &str,
    ) -> StorageResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let row = DbCheckpoint {
            checkpoint_id: id.clone(),
            summary: summary.to_string(),
            next_steps: (!next_steps.is_empty()).then(|| next_steps.to_string()),
            open_files: open_files.to_vec(),
            created_at_ms: Utc::now().timestamp_millis(),
            seq: self.next_seq(),
        };

        self.db
            .query("CREATE checkpoints CONTENT $row RETURN NONE")
            .bind(("row", row))
            .await?
            .check()?;

        info!(id = %id, "checkpoint saved");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn load_checkpoint(&self) -> StorageResult<Option<Checkpoint>> {
        let mut result = self
            .db
            .query(
                "SELECT checkpoint_id, summary, next_steps, open_files, created_at_ms, seq \
                 FROM checkpoints ORDER BY created_at_ms DESC, seq DESC LIMIT 1",
            )
            .await?;
        let rows: Vec<DbCheckpoint> = result.take(0)?;
        Ok(rows.into_iter().next().map(DbCheckpoint::into_checkpoint))
    }

    #[instrument(skip(self))]
    async fn list(&self, limit: usize) -> StorageResult<Vec<MemoryRecord>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {MEMORY_FIELDS} FROM memories \
                 ORDER BY created_at_ms DESC, seq DESC LIMIT $limit"
            ))
            .bind(("limit", limit as i64))
            .await?;
        let rows: Vec<DbMemory> = result.take(0)?;
        Ok(rows.into_iter().map(DbMemory::into_record).collect())
    }

    #[instrument(skip(self, update), fields(outcome = %update.outcome))]
    async fn update_outcome(&self, id: &str, update: OutcomeUpdate) -> StorageResult<()> {
        let id_owned = id.to_string();

        let mut found = self
            .db
            .query("SELECT memory_id FROM memories WHERE memory_id = $id")
            .bind(("id", id_owned.clone()))
            .await?;
        let rows: Vec<IdRow> = found.take(0)?;
        if rows.is_empty() {
            return Err(StateError::NotFound { id: id_owned });
        }

        self.db
            .query(
                "UPDATE memories SET outcome = $outcome, failure_reason = $failure_reason, \
                 limitation = $limitation WHERE memory_id = $id RETURN NONE",
            )
            .bind(("outcome", update.outcome.as_str().to_string()))
            .bind(("failure_reason", update.failure_reason))
            .bind(("limitation", update.limitation))
            .bind(("id", id_owned))
            .await?
            .check()?;

        Ok(())
    }
}

/// Connector opening a [`SurrealMemoryStore`] per storage location.
///
/// The location `mem://` selects the in-memory engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurrealConnector;

#[async_trait]
impl StoreConnector for SurrealConnector {
    async fn connect(&self, location: &Path) -> StorageResult<Arc<dyn MemoryStore>> {
        let store = if location.as_os_str() == IN_MEMORY_LOCATION {
            SurrealMemoryStore::setup_in_memory().await?
        } else {
            SurrealMemoryStore::open(location).await?
        };
        Ok(Arc::new(store))
    }
}
