//! Heuristic detection of decision-like utterances.
//!
//! Detection only surfaces *candidates* for the session-end summary. A real
//! decision record needs a topic and reasoning that keyword matching cannot
//! infer, so nothing detected here is ever written to the store.

use std::sync::OnceLock;

use regex::Regex;

use crate::render::INJECTED_CONTEXT_MARKER;

/// Shorter texts carry too little to be a decision.
pub const MIN_CANDIDATE_CHARS: usize = 20;
/// Longer texts are rarely a single clean decision.
pub const MAX_CANDIDATE_INPUT_CHARS: usize = 500;

/// One pattern per keyword family, CJK variants inline.
const PATTERN_FAMILIES: [&str; 3] = [
    r"(?i)\b(decided|chose|choosing|going with)\b|\buse\b.+\binstead\b|决定|选择|采用",
    r"(?i)\b(will use|approach|strategy)\b|将使用|方案|策略",
    r"(?i)\b(remember|learned|lesson)\b|记住|学到|教训",
];

fn families() -> &'static [Regex] {
    static FAMILIES: OnceLock<Vec<Regex>> = OnceLock::new();
    FAMILIES.get_or_init(|| {
        PATTERN_FAMILIES
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

/// Whether `text` looks like a decision worth offering for review.
pub fn is_candidate_decision(text: &str) -> bool {
    let len = text.chars().count();
    if !(MIN_CANDIDATE_CHARS..=MAX_CANDIDATE_INPUT_CHARS).contains(&len) {
        return false;
    }

    // Our own injected block coming back around
    if text.contains(INJECTED_CONTEXT_MARKER) {
        return false;
    }

    // Other structured/injected markup
    if text.starts_with('<') && text.contains("</") {
        return false;
    }

    families().iter().any(|re| re.is_match(text))
}
