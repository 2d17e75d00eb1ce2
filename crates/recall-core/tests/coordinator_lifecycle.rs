//! End-to-end lifecycle tests for the coordinator against the in-memory fakes.
//!
//! Events are fed in as host JSON so the boundary validation is exercised
//! along with the handlers.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use recall_core::{
    Coordinator, InitGate, LifecycleEvent, LogLevel, RecallConfig, RecordingSink,
    INJECTED_CONTEXT_MARKER,
};
use recall_state::fakes::{FakeConnector, InMemoryStore, StoreOperation};
use recall_state::{Checkpoint, MemoryRecord};
use serde_json::{json, Value};

struct Harness {
    coordinator: Coordinator,
    store: Arc<InMemoryStore>,
    connector: Arc<FakeConnector>,
    sink: Arc<RecordingSink>,
}

fn harness_with(config: RecallConfig) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let connector = Arc::new(FakeConnector::with_store(store.clone()));
    let sink = Arc::new(RecordingSink::new());
    let gate = InitGate::with_environment(
        connector.clone(),
        sink.clone(),
        None,
        Some(PathBuf::from("/home/dev")),
    );
    Harness {
        coordinator: Coordinator::with_gate(config, gate, sink.clone()),
        store,
        connector,
        sink,
    }
}

fn harness() -> Harness {
    harness_with(RecallConfig::default())
}

fn event(raw: Value) -> LifecycleEvent {
    LifecycleEvent::from_value(raw).unwrap()
}

fn prompt(text: &str) -> LifecycleEvent {
    event(json!({"event": "before_agent_start", "prompt": text}))
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn test_relevant_decisions_suppress_recent_section() {
    let mut h = harness();
    h.store.insert_record(MemoryRecord::new(
        "d1",
        "auth",
        "use JWT for auth",
        "stateless sessions scale across nodes",
    ));
    h.store.insert_record(MemoryRecord::new(
        "d2",
        "auth",
        "rotate auth keys weekly",
        "limits blast radius",
    ));
    h.store.insert_record(MemoryRecord::new(
        "d3",
        "cache",
        "redis for sessions",
        "fast",
    ));
    h.store
        .insert_checkpoint(Checkpoint::new("c1", "done", Utc::now()));

    let output = h.coordinator.dispatch(prompt("about auth")).await.unwrap();
    let block = output.prepend_context;

    assert!(block.starts_with(INJECTED_CONTEXT_MARKER));
    assert!(block.contains("## Relevant Decisions"));
    assert!(block.contains("- [50%] auth: use JWT for auth"));
    assert!(block.contains("## Last Checkpoint ("));
    assert!(block.contains("done"));
    assert!(!block.contains("## Recent Decisions"));
    assert!(!block.contains("redis"));
}

#[tokio::test]
async fn test_no_match_falls_back_to_recent_decisions() {
    let mut h = harness();
    for i in 0..5 {
        h.store.insert_record(
            MemoryRecord::new(format!("d{i}"), "storage", format!("option {i}"), "why")
                .with_created_at(noon() + Duration::minutes(i)),
        );
    }

    let block = h
        .coordinator
        .dispatch(prompt("completely unrelated question"))
        .await
        .unwrap()
        .prepend_context;

    assert!(block.contains("## Recent Decisions"));
    assert!(block.contains("[id: d4]"));
    assert!(block.contains("[id: d2]"));
    assert!(!block.contains("[id: d1]"));
    assert_eq!(h.store.calls(StoreOperation::List), 1);
}

#[tokio::test]
async fn test_recall_caps_relevant_decisions_at_three() {
    let mut h = harness();
    for i in 0..5 {
        h.store.insert_record(MemoryRecord::new(
            format!("d{i}"),
            "auth",
            format!("option {i}"),
            "why",
        ));
    }

    let block = h
        .coordinator
        .dispatch(prompt("auth option"))
        .await
        .unwrap()
        .prepend_context;

    assert_eq!(block.matches("\n  id: ").count(), 3);
    for id in ["d0", "d1", "d2"] {
        assert!(block.contains(&format!("  id: {id}")), "{block}");
    }
    assert!(!block.contains("d3"));
    assert!(!block.contains("d4"));
    assert!(!block.contains("## Recent Decisions"));
}

#[tokio::test]
async fn test_weak_match_is_recent_not_relevant() {
    let mut h = harness();
    h.store
        .insert_record(MemoryRecord::new("d1", "auth", "use JWT", "stateless"));

    // One of three query terms matches
    let block = h
        .coordinator
        .dispatch(prompt("auth token rotation"))
        .await
        .unwrap()
        .prepend_context;

    assert!(!block.contains("## Relevant Decisions"));
    assert!(block.contains("## Recent Decisions\n- auth: use JWT [id: d1]"));
    assert_eq!(h.store.calls(StoreOperation::Search), 1);
    assert_eq!(h.store.list_limits(), vec![3]);
}

#[tokio::test]
async fn test_list_limits_per_event() {
    let mut h = harness();

    h.coordinator.dispatch(event(json!({"event": "session_start"}))).await;
    h.coordinator.dispatch(event(json!({"event": "session_end"}))).await;
    h.coordinator
        .dispatch(event(json!({"event": "before_compaction"})))
        .await;
    h.coordinator
        .dispatch(event(json!({"event": "after_compaction"})))
        .await;
    h.coordinator.dispatch(prompt("nothing stored matches")).await;

    assert_eq!(h.store.list_limits(), vec![5, 10, 10, 5, 3]);
}

#[tokio::test]
async fn test_search_failure_degrades_to_checkpoint_only() {
    let mut h = harness();
    h.store.insert_record(MemoryRecord::new("d1", "auth", "use JWT", "why"));
    h.store
        .insert_checkpoint(Checkpoint::new("c1", "halfway there", Utc::now()));
    h.store.fail_on(StoreOperation::Search);
    h.store.fail_on(StoreOperation::List);

    let block = h
        .coordinator
        .dispatch(prompt("how is auth handled?"))
        .await
        .unwrap()
        .prepend_context;

    assert!(block.contains("halfway there"));
    assert!(!block.contains("## Relevant Decisions"));
    assert!(!block.contains("## Recent Decisions"));
    assert!(h.sink.contains(LogLevel::Warn, "search failed"));
    assert!(h.sink.at(LogLevel::Error).is_empty());
}

#[tokio::test]
async fn test_init_failure_is_swallowed_and_retried() {
    let mut h = harness();
    h.connector.set_failing(true);

    assert!(h.coordinator.dispatch(prompt("auth question")).await.is_none());
    h.coordinator.dispatch(event(json!({"event": "session_end"}))).await;
    assert_eq!(h.sink.at(LogLevel::Error).len(), 2);
    assert!(h.store.checkpoints().is_empty());

    h.connector.set_failing(false);
    h.coordinator.dispatch(event(json!({"event": "session_end"}))).await;
    assert_eq!(h.store.checkpoints().len(), 1);
    assert_eq!(h.connector.connects().len(), 3);
}

#[tokio::test]
async fn test_backend_initialized_once_across_events() {
    let mut h = harness_with(RecallConfig::default().with_storage_path("/data/recall"));

    h.coordinator.dispatch(event(json!({"event": "session_start"}))).await;
    h.coordinator.dispatch(prompt("anything at all")).await;
    h.coordinator.dispatch(event(json!({"event": "after_compaction"}))).await;
    h.coordinator.invoke_tool("load_checkpoint", &json!({})).await;

    assert_eq!(h.connector.connects(), vec![PathBuf::from("/data/recall")]);
    assert_eq!(
        h.coordinator.storage_path(),
        Some(PathBuf::from("/data/recall"))
    );
}

#[tokio::test]
async fn test_session_end_skips_fresh_checkpoint() {
    let mut h = harness();
    let now = noon();
    h.coordinator = h.coordinator.with_clock(Arc::new(move || now));
    h.store.insert_checkpoint(Checkpoint::new(
        "c1",
        "recent",
        now - Duration::minutes(2),
    ));

    h.coordinator.dispatch(event(json!({"event": "session_end"}))).await;

    assert_eq!(h.store.checkpoints().len(), 1);
    assert_eq!(h.store.calls(StoreOperation::SaveCheckpoint), 0);
    assert!(h.sink.contains(LogLevel::Info, "skipping"));
}

#[tokio::test]
async fn test_session_end_writes_when_stale() {
    let mut h = harness();
    let now = noon();
    h.coordinator = h.coordinator.with_clock(Arc::new(move || now));
    h.store.insert_checkpoint(Checkpoint::new(
        "c1",
        "old",
        now - Duration::minutes(10),
    ));
    h.store
        .insert_record(MemoryRecord::new("d1", "parser", "hand-rolled", "why"));

    h.coordinator.dispatch(event(json!({"event": "session_start"}))).await;
    h.coordinator.dispatch(prompt("refactor the parser")).await;
    h.coordinator.dispatch(event(json!({"event": "session_end"}))).await;

    let checkpoints = h.store.checkpoints();
    assert_eq!(checkpoints.len(), 2);
    let written = &checkpoints[1];
    assert!(written.summary.starts_with("Session ended: 2026-10-19 12:00 UTC"));
    assert!(written.summary.contains("Last prompt: refactor the parser"));
    assert!(written.summary.contains("Decisions recorded: 1"));
    assert!(written.summary.contains("Recent topics: parser"));
    let next = written.next_steps.as_deref().unwrap();
    assert!(next.contains("most recent: parser"));
    assert!(next.ends_with("Resume from this checkpoint on next session start."));
}

#[tokio::test]
async fn test_staleness_threshold_is_configurable() {
    let config = RecallConfig {
        checkpoint_staleness_ms: 60_000,
        ..RecallConfig::default()
    };
    let mut h = harness_with(config);
    let now = noon();
    h.coordinator = h.coordinator.with_clock(Arc::new(move || now));
    h.store.insert_checkpoint(Checkpoint::new(
        "c1",
        "two minutes old",
        now - Duration::minutes(2),
    ));

    h.coordinator.dispatch(event(json!({"event": "session_end"}))).await;
    assert_eq!(h.store.checkpoints().len(), 2);
}

#[tokio::test]
async fn test_compaction_note_delivered_once() {
    let mut h = harness();
    h.store
        .insert_record(MemoryRecord::new("d1", "auth", "use JWT", "why"));

    h.coordinator
        .dispatch(event(json!({"event": "before_compaction"})))
        .await;
    assert_eq!(h.store.checkpoints().len(), 1);
    assert!(h.store.checkpoints()[0]
        .summary
        .starts_with("[pre-compaction] Snapshot taken:"));
    assert!(h.coordinator.session().compaction_pending());

    let first = h.coordinator.dispatch(prompt("continue")).await.unwrap();
    assert!(first.prepend_context.contains("Context was compacted"));
    assert!(!h.coordinator.session().compaction_pending());

    let second = h.coordinator.dispatch(prompt("continue")).await.unwrap();
    assert!(!second.prepend_context.contains("Context was compacted"));
}

#[tokio::test]
async fn test_compaction_flag_consumed_when_recall_disabled() {
    let config = RecallConfig {
        auto_recall: false,
        ..RecallConfig::default()
    };
    let mut h = harness_with(config);

    h.coordinator
        .dispatch(event(json!({"event": "before_compaction"})))
        .await;
    assert!(h.coordinator.session().compaction_pending());

    assert!(h.coordinator.dispatch(prompt("continue please")).await.is_none());
    assert!(!h.coordinator.session().compaction_pending());
    assert_eq!(h.store.calls(StoreOperation::Search), 0);
}

#[tokio::test]
async fn test_compaction_flag_consumed_when_backend_unavailable() {
    let mut h = harness();
    h.connector.set_failing(true);

    h.coordinator
        .dispatch(event(json!({"event": "before_compaction"})))
        .await;
    assert!(h.coordinator.session().compaction_pending());

    assert!(h.coordinator.dispatch(prompt("continue please")).await.is_none());
    assert!(!h.coordinator.session().compaction_pending());

    // Recovery does not resurrect the note
    h.connector.set_failing(false);
    h.store
        .insert_record(MemoryRecord::new("d1", "auth", "use JWT", "why"));
    let block = h
        .coordinator
        .dispatch(prompt("continue please"))
        .await
        .unwrap()
        .prepend_context;
    assert!(!block.contains("Context was compacted"));
}

#[tokio::test]
async fn test_pre_compaction_ignores_staleness() {
    let mut h = harness();
    h.store
        .insert_checkpoint(Checkpoint::new("c1", "just now", Utc::now()));
    h.store.fail_on(StoreOperation::List);

    h.coordinator
        .dispatch(event(json!({"event": "before_compaction"})))
        .await;

    assert_eq!(h.store.checkpoints().len(), 2);
    assert!(h.sink.contains(LogLevel::Warn, "listing recent decisions failed"));
}

#[tokio::test]
async fn test_compaction_flag_set_even_when_snapshot_fails() {
    let mut h = harness();
    h.store.fail_on(StoreOperation::SaveCheckpoint);

    h.coordinator
        .dispatch(event(json!({"event": "before_compaction"})))
        .await;

    assert!(h.coordinator.session().compaction_pending());
    assert!(h.coordinator.session().last_compaction_at.is_some());
    assert_eq!(h.sink.at(LogLevel::Error).len(), 1);
}

#[tokio::test]
async fn test_agent_end_candidates_flow_into_next_steps() {
    let mut h = harness();
    h.coordinator.dispatch(event(json!({"event": "session_start"}))).await;

    h.coordinator
        .dispatch(event(json!({
            "event": "agent_end",
            "success": true,
            "messages": [
                {"role": "user", "content": "We decided to store sessions in sqlite"},
                {"role": "assistant", "content": [
                    {"type": "text", "text": "Lesson learned: always pin the toolchain"},
                    {"type": "tool_use", "text": "we decided nothing here at all"}
                ]},
                {"role": "system", "content": "We decided to ignore system prompts here"}
            ]
        })))
        .await;

    assert_eq!(h.coordinator.session().candidate_count(), 2);
    assert_eq!(h.store.calls(StoreOperation::Save), 0);

    h.coordinator.dispatch(event(json!({"event": "session_end"}))).await;
    let next = h.store.checkpoints()[0].next_steps.clone().unwrap();
    assert!(next.starts_with(
        "Review auto-captured decision candidates:\n\
         - Lesson learned: always pin the toolchain\n\
         - We decided to store sessions in sqlite"
    ));
    assert!(next.contains("No new decisions recorded this session."));
}

#[tokio::test]
async fn test_injected_context_never_captured() {
    let mut h = harness();
    h.store
        .insert_record(MemoryRecord::new("d1", "auth", "we decided to use JWT", "why"));
    let block = h
        .coordinator
        .dispatch(prompt("what did we decide about auth"))
        .await
        .unwrap()
        .prepend_context;

    h.coordinator
        .dispatch(event(json!({
            "event": "agent_end",
            "success": true,
            "messages": [{"role": "user", "content": block}]
        })))
        .await;

    assert_eq!(h.coordinator.session().candidate_count(), 0);
}

#[tokio::test]
async fn test_auto_capture_disabled() {
    let config = RecallConfig {
        auto_capture: false,
        ..RecallConfig::default()
    };
    let mut h = harness_with(config);

    h.coordinator
        .dispatch(event(json!({
            "event": "agent_end",
            "success": true,
            "messages": [{"role": "assistant", "content": "We decided to go with tokio for the runtime"}]
        })))
        .await;

    assert_eq!(h.coordinator.session().candidate_count(), 0);
}

#[tokio::test]
async fn test_session_start_resets_state() {
    let mut h = harness();
    h.coordinator.dispatch(prompt("first session prompt")).await;
    h.coordinator
        .dispatch(event(json!({"event": "before_compaction"})))
        .await;

    h.coordinator.dispatch(event(json!({"event": "session_start"}))).await;

    let session = h.coordinator.session();
    assert!(session.session_started_at.is_some());
    assert!(session.last_user_prompt.is_none());
    assert!(session.last_compaction_at.is_none());
    assert!(!session.compaction_pending());
}
