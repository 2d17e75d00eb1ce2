//! In-memory fakes for storage traits (testing only)
//!
//! Provides `InMemoryStore` and `FakeConnector` that satisfy the trait
//! contracts without any external dependencies. Both support failure
//! injection so callers can exercise their error paths.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StateError;
use crate::schema::{Checkpoint, MemoryRecord};
use crate::storage_traits::*;

/// Store operations, used to target injected failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Search,
    Save,
    SaveCheckpoint,
    LoadCheckpoint,
    List,
    UpdateOutcome,
}

impl StoreOperation {
    fn name(&self) -> &'static str {
        match self {
            StoreOperation::Search => "search",
            StoreOperation::Save => "save",
            StoreOperation::SaveCheckpoint => "save_checkpoint",
            StoreOperation::LoadCheckpoint => "load_checkpoint",
            StoreOperation::List => "list",
            StoreOperation::UpdateOutcome => "update_outcome",
        }
    }
}

// ---------------------------------------------------------------------------
// InMemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StoreState {
    records: Vec<MemoryRecord>,
    checkpoints: Vec<Checkpoint>,
    failing: HashSet<StoreOperation>,
    calls: HashMap<StoreOperation, usize>,
    list_limits: Vec<usize>,
}

/// In-memory memory store backed by plain vectors.
///
/// Search uses [`lexical_similarity`] so results are deterministic.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a decision record directly, bypassing `save`.
    pub fn insert_record(&self, record: MemoryRecord) {
        self.state.lock().unwrap().records.push(record);
    }

    /// Seed a checkpoint directly, bypassing `save_checkpoint`.
    pub fn insert_checkpoint(&self, checkpoint: Checkpoint) {
        self.state.lock().unwrap().checkpoints.push(checkpoint);
    }

    /// Make every subsequent call to `operation` fail.
    pub fn fail_on(&self, operation: StoreOperation) {
        self.state.lock().unwrap().failing.insert(operation);
    }

    /// Stop failing `operation`.
    pub fn recover(&self, operation: StoreOperation) {
        self.state.lock().unwrap().failing.remove(&operation);
    }

    /// Number of times `operation` was invoked (including failed calls).
    pub fn calls(&self, operation: StoreOperation) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    /// The `limit` of every successful `list` call, in call order.
    pub fn list_limits(&self) -> Vec<usize> {
        self.state.lock().unwrap().list_limits.clone()
    }

    /// All checkpoints in save order.
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.state.lock().unwrap().checkpoints.clone()
    }

    /// All decision records in save order.
    pub fn records(&self) -> Vec<MemoryRecord> {
        self.state.lock().unwrap().records.clone()
    }

    fn enter(&self, operation: StoreOperation) -> StorageResult<std::sync::MutexGuard<'_, StoreState>> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(operation).or_default() += 1;
        if state.failing.contains(&operation) {
            return Err(StateError::Injected {
                operation: operation.name().to_string(),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> StorageResult<Option<SearchResponse>> {
        let state = self.enter(StoreOperation::Search)?;
        if query.trim().is_empty() {
            return Ok(None);
        }

        let mut results: Vec<MemoryRecord> = state
            .records
            .iter()
            .filter_map(|r| {
                let score = lexical_similarity(query, &searchable_text(r));
                (score >= options.threshold && score > 0.0)
                    .then(|| r.clone().with_similarity(score))
            })
            .collect();
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(options.limit);

        Ok(Some(SearchResponse {
            query: query.to_string(),
            results,
        }))
    }

    async fn save(&self, request: SaveRequest) -> StorageResult<SaveReceipt> {
        let mut state = self.enter(StoreOperation::Save)?;
        let id = uuid::Uuid::new_v4().to_string();
        let receipt = assess_save(&state.records, &request, id.clone());

        let mut record = MemoryRecord::new(id, request.topic, request.decision, request.reasoning)
            .with_created_at(Utc::now());
        record.confidence = Some(request.confidence);
        state.records.push(record);
        Ok(receipt)
    }

    async fn save_checkpoint(
        &self,
        summary: &str,
        open_files: &[String],
        next_steps: &str,
    ) -> StorageResult<String> {
        let mut state = self.enter(StoreOperation::SaveCheckpoint)?;
        let id = uuid::Uuid::new_v4().to_string();
        let mut checkpoint = Checkpoint::new(id.clone(), summary, Utc::now());
        if !next_steps.is_empty() {
            checkpoint.next_steps = Some(next_steps.to_string());
        }
        checkpoint.open_files = open_files.to_vec();
        state.checkpoints.push(checkpoint);
        Ok(id)
    }

    async fn load_checkpoint(&self) -> StorageResult<Option<Checkpoint>> {
        let state = self.enter(StoreOperation::LoadCheckpoint)?;
        Ok(state.checkpoints.iter().max_by_key(|c| c.timestamp).cloned())
    }

    async fn list(&self, limit: usize) -> StorageResult<Vec<MemoryRecord>> {
        let mut state = self.enter(StoreOperation::List)?;
        state.list_limits.push(limit);
        let mut records = state.records.clone();
        records.reverse();
        // Stable: equal timestamps keep newest-inserted first
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn update_outcome(&self, id: &str, update: OutcomeUpdate) -> StorageResult<()> {
        let mut state = self.enter(StoreOperation::UpdateOutcome)?;
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StateError::NotFound { id: id.to_string() })?;
        record.outcome = Some(update.outcome);
        record.failure_reason = update.failure_reason;
        record.limitation = update.limitation;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeConnector
// ---------------------------------------------------------------------------

/// Connector that hands out one shared `InMemoryStore` and remembers every
/// location it was asked to connect to.
#[derive(Debug, Default)]
pub struct FakeConnector {
    store: Arc<InMemoryStore>,
    connects: Mutex<Vec<PathBuf>>,
    failing: AtomicBool,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector around an existing store, so tests can seed it first.
    pub fn with_store(store: Arc<InMemoryStore>) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    pub fn store(&self) -> Arc<InMemoryStore> {
        self.store.clone()
    }

    /// Toggle connection failures.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Locations passed to `connect`, in call order.
    pub fn connects(&self) -> Vec<PathBuf> {
        self.connects.lock().unwrap().clone()
    }
}

#[async_trait]
impl StoreConnector for FakeConnector {
    async fn connect(&self, location: &Path) -> StorageResult<Arc<dyn MemoryStore>> {
        self.connects.lock().unwrap().push(location.to_path_buf());
        if self.failing.load(Ordering::SeqCst) {
            return Err(StateError::Connection(format!(
                "storage unreachable at {}",
                location.display()
            )));
        }
        let store: Arc<dyn MemoryStore> = self.store.clone();
        Ok(store)
    }
}
