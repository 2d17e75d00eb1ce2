//! Lifecycle coordinator.
//!
//! Receives host lifecycle events and tool calls, owns the session state and
//! the init gate, and talks to the memory backend. Handlers take `&mut self`,
//! so at most one event or tool call is in flight per coordinator. Hosts that
//! deliver events concurrently wrap the coordinator in a
//! `tokio::sync::Mutex`.
//!
//! No handler ever fails into the host: errors are logged with the event
//! name and the event produces no output.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use recall_state::{MemoryRecord, MemoryStore, SearchOptions, StoreConnector};
use serde_json::Value;

use crate::checkpoint_policy::{compose_next_steps, compose_summary, should_skip, CheckpointTrigger};
use crate::detector::is_candidate_decision;
use crate::domain::{AgentEnd, BeforeAgentStart, HookOutput, LifecycleEvent, RecallConfig, Result};
use crate::init_gate::InitGate;
use crate::obs::LogSink;
use crate::render::{compaction_note, render_memory_context};
use crate::session::SessionState;
use crate::tools::{self, error_text, ToolCall};

/// Prompts shorter than this (trimmed, in chars) skip semantic recall.
pub const MIN_RECALL_PROMPT_CHARS: usize = 5;
pub const RECALL_SEARCH_LIMIT: usize = 3;
pub const RECALL_SEARCH_THRESHOLD: f32 = 0.5;
/// Recent decisions injected when no semantic match was found.
pub const RECALL_RECENT_LIMIT: usize = 3;
/// Recent decisions listed on session start and after compaction.
pub const STATUS_RECENT_LIMIT: usize = 5;
/// Recent decisions feeding an automatic checkpoint.
pub const CHECKPOINT_RECENT_LIMIT: usize = 10;

/// Source of "now" for handlers.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct Coordinator {
    config: RecallConfig,
    gate: InitGate,
    session: SessionState,
    sink: Arc<dyn LogSink>,
    clock: Clock,
}

impl Coordinator {
    /// Coordinator resolving storage from `config`, then the process
    /// environment.
    pub fn new(
        config: RecallConfig,
        connector: Arc<dyn StoreConnector>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let gate = InitGate::new(connector, sink.clone());
        Self::with_gate(config, gate, sink)
    }

    pub fn with_gate(config: RecallConfig, gate: InitGate, sink: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            gate,
            session: SessionState::default(),
            sink,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn config(&self) -> &RecallConfig {
        &self.config
    }

    /// Storage location in effect, once the backend is up.
    pub fn storage_path(&self) -> Option<PathBuf> {
        self.gate.storage_path().map(|p| p.to_path_buf())
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    async fn store(&mut self) -> Result<Arc<dyn MemoryStore>> {
        self.gate
            .ensure_initialized(self.config.storage_path.as_deref())
            .await
    }

    /// Handle one lifecycle event.
    ///
    /// Only `before_agent_start` can produce output.
    pub async fn dispatch(&mut self, event: LifecycleEvent) -> Option<HookOutput> {
        let name = event.name();
        let result = match event {
            LifecycleEvent::SessionStart => self.on_session_start().await.map(|_| None),
            LifecycleEvent::BeforeAgentStart(payload) => self.on_before_agent_start(payload).await,
            LifecycleEvent::AgentEnd(payload) => {
                self.on_agent_end(payload);
                Ok(None)
            }
            LifecycleEvent::SessionEnd => self.on_session_end().await.map(|_| None),
            LifecycleEvent::BeforeCompaction => self.on_before_compaction().await.map(|_| None),
            LifecycleEvent::AfterCompaction => self.on_after_compaction().await.map(|_| None),
        };

        match result {
            Ok(output) => output,
            Err(e) => {
                self.sink.error(name, &e.to_string());
                None
            }
        }
    }

    /// Run one tool call and return its text payload.
    ///
    /// Validation, initialization and backend failures all come back as
    /// `Error: ...` text.
    pub async fn invoke_tool(&mut self, tool: &str, params: &Value) -> String {
        let call = match ToolCall::parse(tool, params) {
            Ok(call) => call,
            Err(e) => return error_text(&e),
        };

        let store = match self.store().await {
            Ok(store) => store,
            Err(e) => {
                self.sink.error(call.name(), &e.to_string());
                return error_text(&e);
            }
        };

        let name = call.name();
        match tools::execute(store.as_ref(), call).await {
            Ok(text) => text,
            Err(e) => {
                self.sink.error(name, &e.to_string());
                error_text(&e)
            }
        }
    }

    async fn on_session_start(&mut self) -> Result<()> {
        self.session = SessionState::started(self.now());

        let store = self.store().await?;
        let checkpoint = store.load_checkpoint().await?;
        let recent = store.list(STATUS_RECENT_LIMIT).await?;

        self.sink.info(
            "session_start",
            &format!(
                "session started; checkpoint: {}, recent decisions: {}",
                checkpoint.as_ref().map(|c| c.id.as_str()).unwrap_or("none"),
                recent.len()
            ),
        );
        Ok(())
    }

    async fn on_before_agent_start(
        &mut self,
        payload: BeforeAgentStart,
    ) -> Result<Option<HookOutput>> {
        const EVENT: &str = "before_agent_start";

        let prompt = payload.prompt.unwrap_or_default();
        let query = prompt.trim();
        if !query.is_empty() {
            self.session.record_prompt(&prompt);
        }

        // Consumed by this turn whether or not anything gets injected
        let note = self
            .session
            .take_compaction()
            .then(|| compaction_note(self.session.last_compaction_at.as_ref()));

        if !self.config.auto_recall {
            return Ok(None);
        }

        let store = self.store().await?;

        let semantic = if query.chars().count() >= MIN_RECALL_PROMPT_CHARS {
            let options = SearchOptions::new(RECALL_SEARCH_LIMIT, RECALL_SEARCH_THRESHOLD);
            match store.search(query, options).await {
                Ok(response) => response.map(|r| r.results).unwrap_or_default(),
                Err(e) => {
                    self.sink.warn(EVENT, &format!("search failed: {e}"));
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let checkpoint = match store.load_checkpoint().await {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                self.sink.warn(EVENT, &format!("load checkpoint failed: {e}"));
                None
            }
        };

        let recent = if semantic.is_empty() {
            self.list_tolerant(store.as_ref(), RECALL_RECENT_LIMIT, EVENT)
                .await
        } else {
            Vec::new()
        };

        if semantic.is_empty() && checkpoint.is_none() && recent.is_empty() {
            return Ok(None);
        }

        self.sink.info(
            EVENT,
            &format!(
                "injecting memory: {} relevant, {} recent, checkpoint: {}",
                semantic.len(),
                recent.len(),
                checkpoint.is_some()
            ),
        );
        Ok(Some(HookOutput {
            prepend_context: render_memory_context(
                &semantic,
                checkpoint.as_ref(),
                &recent,
                note.as_deref(),
            ),
        }))
    }

    fn on_agent_end(&mut self, payload: AgentEnd) {
        if !self.config.auto_capture || !payload.success || payload.messages.is_empty() {
            return;
        }

        let mut captured = 0;
        for message in &payload.messages {
            for text in message.texts() {
                if is_candidate_decision(text) && self.session.push_candidate(text) {
                    captured += 1;
                }
            }
        }

        if captured > 0 {
            self.sink.info(
                "agent_end",
                &format!(
                    "captured {} decision candidate(s); {} pending review",
                    captured,
                    self.session.candidate_count()
                ),
            );
        }
    }

    async fn on_session_end(&mut self) -> Result<()> {
        const EVENT: &str = "session_end";
        let now = self.now();

        let store = self.store().await?;
        let existing = store.load_checkpoint().await?;
        let threshold = Duration::from_millis(self.config.checkpoint_staleness_ms);
        if should_skip(existing.as_ref(), now, threshold) {
            self.sink
                .info(EVENT, "recent checkpoint exists; skipping auto-checkpoint");
            return Ok(());
        }

        let recent = store.list(CHECKPOINT_RECENT_LIMIT).await?;
        let summary = compose_summary(CheckpointTrigger::SessionEnd, &self.session, now, &recent);
        let next_steps = compose_next_steps(&self.session, &recent);
        let id = store.save_checkpoint(&summary, &[], &next_steps).await?;

        self.sink
            .info(EVENT, &format!("auto-checkpoint saved: {id}"));
        Ok(())
    }

    /// The compaction flag is set even when the snapshot cannot be written,
    /// since the host compacts regardless.
    async fn on_before_compaction(&mut self) -> Result<()> {
        let now = self.now();
        let result = self.write_pre_compaction_snapshot(now).await;
        self.session.mark_compacted(now);
        result
    }

    async fn write_pre_compaction_snapshot(&mut self, now: DateTime<Utc>) -> Result<()> {
        const EVENT: &str = "before_compaction";

        let store = self.store().await?;
        let recent = self
            .list_tolerant(store.as_ref(), CHECKPOINT_RECENT_LIMIT, EVENT)
            .await;
        let summary = compose_summary(CheckpointTrigger::PreCompaction, &self.session, now, &recent);
        let next_steps = compose_next_steps(&self.session, &recent);
        let id = store.save_checkpoint(&summary, &[], &next_steps).await?;

        self.sink
            .info(EVENT, &format!("pre-compaction checkpoint saved: {id}"));
        Ok(())
    }

    async fn on_after_compaction(&mut self) -> Result<()> {
        let store = self.store().await?;
        let checkpoint = store.load_checkpoint().await?;
        let recent = store.list(STATUS_RECENT_LIMIT).await?;

        self.sink.info(
            "after_compaction",
            &format!(
                "compaction finished; checkpoint: {}, recent decisions: {}",
                checkpoint.as_ref().map(|c| c.id.as_str()).unwrap_or("none"),
                recent.len()
            ),
        );
        Ok(())
    }

    async fn list_tolerant(
        &self,
        store: &dyn MemoryStore,
        limit: usize,
        event: &str,
    ) -> Vec<MemoryRecord> {
        match store.list(limit).await {
            Ok(records) => records,
            Err(e) => {
                self.sink
                    .warn(event, &format!("listing recent decisions failed: {e}"));
                Vec::new()
            }
        }
    }
}
