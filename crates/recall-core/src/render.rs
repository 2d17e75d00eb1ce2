//! Rendering retrieved memory into one injectable text block.
//!
//! Everything here is pure. The block layout is fixed:
//!
//! ```text
//! <session-memory>
//! ## Relevant Decisions      (semantic matches, if any)
//! ## Last Checkpoint         (if any)
//! ## Recent Decisions        (only when there are no semantic matches)
//! <compaction note>          (if any)
//! </session-memory>
//! ```

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use recall_state::{Checkpoint, MemoryRecord};
use regex::Regex;

/// Opening tag of the injected block. Text containing it is never captured
/// back as a new decision.
pub const INJECTED_CONTEXT_MARKER: &str = "<session-memory>";
const INJECTED_CONTEXT_CLOSE: &str = "</session-memory>";

/// Reasoning budget for lines in the injected block, in chars.
pub const RENDER_REASONING_CHARS: usize = 100;

const ELLIPSIS: &str = "...";
const LINK_GLYPH: &str = "🔗";

/// First `limit` chars of `text` followed by `...`, or `text` unchanged when
/// it already fits.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit).collect();
    out.push_str(ELLIPSIS);
    out
}

fn link_pattern() -> Option<&'static Regex> {
    static LINK: OnceLock<Option<Regex>> = OnceLock::new();
    LINK.get_or_init(|| {
        Regex::new(
            r"\b(?:builds_on|debates):[ \t]*[\w-]+(?:[./][\w-]+)*|\bsynthesizes:[ \t]*\[[^\]]*\]",
        )
        .ok()
    })
    .as_ref()
}

/// The last relationship annotation in `text`, if any.
///
/// Recognised shapes: `builds_on: <id>`, `debates: <id>` (a single bare
/// identifier) and `synthesizes: [<id>, ...]`. Prose after the identifier or
/// closing bracket is not part of the match. The identifier must sit on the
/// same line as its keyword.
pub fn extract_link(text: &str) -> Option<&str> {
    link_pattern()?.find_iter(text).last().map(|m| m.as_str())
}

/// Truncate `reasoning` to `budget` and re-attach any link annotation the
/// cut removed, on its own line.
///
/// The annotation is looked up in the full text, so truncation can neither
/// split it nor cause it to appear twice.
pub fn format_reasoning(reasoning: &str, budget: usize) -> String {
    let mut out = truncate(reasoning, budget);
    if let Some(link) = extract_link(reasoning) {
        if !out.contains(link) {
            out.push('\n');
            out.push_str(LINK_GLYPH);
            out.push(' ');
            out.push_str(link);
        }
    }
    out
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// `round(similarity * 100)`, missing similarity counts as zero.
pub fn similarity_percent(record: &MemoryRecord) -> i64 {
    (record.similarity.unwrap_or(0.0) as f64 * 100.0).round() as i64
}

fn outcome_suffix(record: &MemoryRecord) -> String {
    record
        .outcome
        .map(|o| format!(" ({o})"))
        .unwrap_or_default()
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|l| format!("{prefix}{l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn semantic_section(matches: &[MemoryRecord]) -> String {
    let mut out = String::from("## Relevant Decisions");
    for record in matches {
        out.push_str(&format!(
            "\n- [{}%] {}: {}{}",
            similarity_percent(record),
            record.topic,
            record.decision,
            outcome_suffix(record)
        ));
        if !record.reasoning.is_empty() {
            out.push('\n');
            out.push_str(&indent(
                &format_reasoning(&record.reasoning, RENDER_REASONING_CHARS),
                "  ",
            ));
        }
        out.push_str(&format!("\n  id: {}", record.id));
    }
    out
}

fn checkpoint_section(checkpoint: &Checkpoint) -> String {
    let mut out = format!(
        "## Last Checkpoint ({})\n{}",
        format_timestamp(&checkpoint.timestamp),
        checkpoint.summary
    );
    if let Some(next) = checkpoint.next_steps.as_deref().filter(|n| !n.is_empty()) {
        out.push_str("\nNext steps:\n");
        out.push_str(next);
    }
    out
}

fn recent_section(recent: &[MemoryRecord]) -> String {
    let mut out = String::from("## Recent Decisions");
    for record in recent {
        out.push_str(&format!(
            "\n- {}: {}{} [id: {}]",
            record.topic,
            record.decision,
            outcome_suffix(record),
            record.id
        ));
    }
    out
}

/// One-line note telling the agent its context was compacted.
pub fn compaction_note(at: Option<&DateTime<Utc>>) -> String {
    match at {
        Some(ts) => format!(
            "Context was compacted at {}; the checkpoint above was saved just before it. Resume from there.",
            format_timestamp(ts)
        ),
        None => "Context was compacted; the checkpoint above was saved just before it. Resume from there."
            .to_string(),
    }
}

/// Compose the injected block.
///
/// `recent` is only rendered when `semantic` is empty.
pub fn render_memory_context(
    semantic: &[MemoryRecord],
    checkpoint: Option<&Checkpoint>,
    recent: &[MemoryRecord],
    compaction_note: Option<&str>,
) -> String {
    let mut sections = Vec::new();

    if !semantic.is_empty() {
        sections.push(semantic_section(semantic));
    }
    if let Some(cp) = checkpoint {
        sections.push(checkpoint_section(cp));
    }
    if semantic.is_empty() && !recent.is_empty() {
        sections.push(recent_section(recent));
    }
    if let Some(note) = compaction_note {
        sections.push(note.to_string());
    }

    format!(
        "{INJECTED_CONTEXT_MARKER}\n{}\n{INJECTED_CONTEXT_CLOSE}",
        sections.join("\n\n")
    )
}
