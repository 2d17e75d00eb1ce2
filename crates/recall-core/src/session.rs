//! Per-session state carried between lifecycle events.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Longest prompt kept for checkpoint summaries, in chars.
pub const MAX_PROMPT_CHARS: usize = 200;
/// Longest auto-capture candidate, in chars.
pub const MAX_CANDIDATE_CHARS: usize = 160;
/// Number of auto-capture candidates retained.
pub const CANDIDATE_CAPACITY: usize = 3;

/// Cross-event session record. One per active session, owned by the
/// coordinator and overwritten on `session_start`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub session_started_at: Option<DateTime<Utc>>,
    pub last_user_prompt: Option<String>,
    pub last_compaction_at: Option<DateTime<Utc>>,
    /// Newest first, at most [`CANDIDATE_CAPACITY`], no exact duplicates.
    auto_capture_candidates: VecDeque<String>,
    /// Set before compaction, consumed by the next agent turn.
    compaction_occurred: bool,
}

/// First `max` chars of `text` (no ellipsis).
pub fn clip_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

impl SessionState {
    /// Fresh state for a session starting at `now`.
    pub fn started(now: DateTime<Utc>) -> Self {
        Self {
            session_started_at: Some(now),
            ..Self::default()
        }
    }

    pub fn record_prompt(&mut self, prompt: &str) {
        self.last_user_prompt = Some(clip_chars(prompt, MAX_PROMPT_CHARS));
    }

    /// Insert a detected candidate at the front.
    ///
    /// The text is clipped to [`MAX_CANDIDATE_CHARS`] first; an identical
    /// clipped string already present is left where it is. Returns whether
    /// the candidate was inserted.
    pub fn push_candidate(&mut self, text: &str) -> bool {
        let candidate = clip_chars(text, MAX_CANDIDATE_CHARS);
        if self.auto_capture_candidates.contains(&candidate) {
            return false;
        }
        self.auto_capture_candidates.push_front(candidate);
        self.auto_capture_candidates.truncate(CANDIDATE_CAPACITY);
        true
    }

    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.auto_capture_candidates.iter().map(String::as_str)
    }

    pub fn candidate_count(&self) -> usize {
        self.auto_capture_candidates.len()
    }

    pub fn mark_compacted(&mut self, at: DateTime<Utc>) {
        self.compaction_occurred = true;
        self.last_compaction_at = Some(at);
    }

    pub fn compaction_pending(&self) -> bool {
        self.compaction_occurred
    }

    /// Read and clear the compaction flag.
    pub fn take_compaction(&mut self) -> bool {
        std::mem::take(&mut self.compaction_occurred)
    }
}
