//! When to write an automatic checkpoint, and what to put in it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use recall_state::{Checkpoint, MemoryRecord};

use crate::render::format_timestamp;
use crate::session::SessionState;

/// Recent topics listed in an auto-checkpoint summary.
pub const MAX_SUMMARY_TOPICS: usize = 5;

const RESUME_LINE: &str = "Resume from this checkpoint on next session start.";

/// What caused an automatic checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointTrigger {
    SessionEnd,
    PreCompaction,
}

impl CheckpointTrigger {
    fn headline(&self, now: &DateTime<Utc>) -> String {
        match self {
            CheckpointTrigger::SessionEnd => format!("Session ended: {}", format_timestamp(now)),
            CheckpointTrigger::PreCompaction => {
                format!("[pre-compaction] Snapshot taken: {}", format_timestamp(now))
            }
        }
    }
}

/// True iff `existing` was written less than `threshold` before `now`.
///
/// A checkpoint stamped in the future counts as fresh.
pub fn should_skip(existing: Option<&Checkpoint>, now: DateTime<Utc>, threshold: Duration) -> bool {
    let Some(checkpoint) = existing else {
        return false;
    };
    let age_ms = now
        .signed_duration_since(checkpoint.timestamp)
        .num_milliseconds();
    let threshold_ms = i64::try_from(threshold.as_millis()).unwrap_or(i64::MAX);
    age_ms < threshold_ms
}

/// Summary text, one line per known fact, in fixed order.
pub fn compose_summary(
    trigger: CheckpointTrigger,
    state: &SessionState,
    now: DateTime<Utc>,
    recent: &[MemoryRecord],
) -> String {
    let mut lines = vec![trigger.headline(&now)];

    if let Some(started) = &state.session_started_at {
        lines.push(format!("Session started: {}", format_timestamp(started)));
    }
    if let Some(prompt) = &state.last_user_prompt {
        lines.push(format!("Last prompt: {prompt}"));
    }
    if let Some(compacted) = &state.last_compaction_at {
        lines.push(format!("Last compaction: {}", format_timestamp(compacted)));
    }
    lines.push(format!("Decisions recorded: {}", recent.len()));

    let topics: Vec<&str> = recent
        .iter()
        .take(MAX_SUMMARY_TOPICS)
        .map(|r| r.topic.as_str())
        .collect();
    if !topics.is_empty() {
        lines.push(format!("Recent topics: {}", topics.join(", ")));
    }

    lines.join("\n")
}

/// Next-steps text: candidates to review, decisions to review, resume hint.
pub fn compose_next_steps(state: &SessionState, recent: &[MemoryRecord]) -> String {
    let mut blocks = Vec::new();

    if state.candidate_count() > 0 {
        let items: Vec<String> = state.candidates().map(|c| format!("- {c}")).collect();
        blocks.push(format!(
            "Review auto-captured decision candidates:\n{}",
            items.join("\n")
        ));
    }

    match recent.first() {
        Some(latest) => blocks.push(format!(
            "Review {} recent decision(s); most recent: {}",
            recent.len(),
            latest.topic
        )),
        None => blocks.push("No new decisions recorded this session.".to_string()),
    }

    blocks.push(RESUME_LINE.to_string());
    blocks.join("\n")
}
