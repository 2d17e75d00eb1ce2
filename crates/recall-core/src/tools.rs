//! Tool surface exposed to the agent: search, save, load_checkpoint, update.
//!
//! Hosts hand over a tool name and a JSON parameter object. Parameters are
//! validated into a [`ToolCall`] once; execution always produces one text
//! payload, and failures are plain text starting with [`ERROR_PREFIX`].

use std::fmt::Display;

use recall_state::{
    Checkpoint, MemoryRecord, MemoryStore, Outcome, OutcomeUpdate, SaveReceipt, SaveRequest,
    SearchOptions,
};
use serde_json::Value;

use crate::domain::{Result, ValidationError};
use crate::render::{format_reasoning, format_timestamp, similarity_percent};

pub const DEFAULT_SEARCH_LIMIT: usize = 5;
pub const MAX_SEARCH_LIMIT: usize = 20;
/// Explicit searches cast a wider net than auto-recall.
pub const TOOL_SEARCH_THRESHOLD: f32 = 0.3;
pub const DEFAULT_CONFIDENCE: f32 = 0.8;
/// Reasoning budget for tool output, in chars.
pub const TOOL_REASONING_CHARS: usize = 200;

/// Marker every user-visible failure starts with.
pub const ERROR_PREFIX: &str = "Error: ";

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    Search {
        query: String,
        limit: usize,
    },
    SaveDecision {
        topic: String,
        decision: String,
        reasoning: String,
        confidence: f32,
    },
    SaveCheckpoint {
        summary: String,
        next_steps: Option<String>,
        open_files: Vec<String>,
    },
    LoadCheckpoint,
    Update {
        id: String,
        outcome: Outcome,
        reason: Option<String>,
    },
}

fn text_param(params: &Value, field: &str) -> Option<String> {
    params
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required(params: &Value, tool: &str, field: &str) -> std::result::Result<String, ValidationError> {
    text_param(params, field).ok_or_else(|| ValidationError::missing(tool, field))
}

fn number_param(params: &Value, field: &str) -> std::result::Result<Option<f64>, ValidationError> {
    match params.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| ValidationError::invalid(field, "expected a number")),
    }
}

impl ToolCall {
    /// Tool name as exposed to the host.
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::Search { .. } => "search",
            ToolCall::SaveDecision { .. } | ToolCall::SaveCheckpoint { .. } => "save",
            ToolCall::LoadCheckpoint => "load_checkpoint",
            ToolCall::Update { .. } => "update",
        }
    }

    /// Validate host parameters for `tool`.
    pub fn parse(tool: &str, params: &Value) -> std::result::Result<Self, ValidationError> {
        match tool {
            "search" => {
                let query = required(params, tool, "query")?;
                let limit = match number_param(params, "limit")? {
                    None => DEFAULT_SEARCH_LIMIT,
                    Some(n) if n >= 1.0 => (n as usize).min(MAX_SEARCH_LIMIT),
                    Some(_) => return Err(ValidationError::invalid("limit", "must be at least 1")),
                };
                Ok(ToolCall::Search { query, limit })
            }
            "save" => match required(params, tool, "type")?.to_ascii_lowercase().as_str() {
                "decision" => {
                    let confidence = match number_param(params, "confidence")? {
                        None => DEFAULT_CONFIDENCE,
                        Some(c) if (0.0..=1.0).contains(&c) => c as f32,
                        Some(_) => {
                            return Err(ValidationError::invalid(
                                "confidence",
                                "must be between 0.0 and 1.0",
                            ))
                        }
                    };
                    Ok(ToolCall::SaveDecision {
                        topic: required(params, tool, "topic")?,
                        decision: required(params, tool, "decision")?,
                        reasoning: required(params, tool, "reasoning")?,
                        confidence,
                    })
                }
                "checkpoint" => Ok(ToolCall::SaveCheckpoint {
                    summary: required(params, tool, "summary")?,
                    next_steps: text_param(params, "next_steps"),
                    open_files: params
                        .get("open_files")
                        .and_then(Value::as_array)
                        .map(|files| {
                            files
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                }),
                other => Err(ValidationError::invalid(
                    "type",
                    format!("expected decision or checkpoint, got {other}"),
                )),
            },
            "load_checkpoint" => Ok(ToolCall::LoadCheckpoint),
            "update" => {
                let id = required(params, tool, "id")?;
                let raw = required(params, tool, "outcome")?;
                let outcome = match raw.parse::<Outcome>() {
                    Ok(Outcome::Pending) | Err(_) => {
                        return Err(ValidationError::invalid(
                            "outcome",
                            "expected success, failed or partial",
                        ))
                    }
                    Ok(outcome) => outcome,
                };
                Ok(ToolCall::Update {
                    id,
                    outcome,
                    reason: text_param(params, "reason"),
                })
            }
            _ => Err(ValidationError::UnknownTool {
                tool: tool.to_string(),
            }),
        }
    }
}

/// User-visible failure text.
pub fn error_text(err: &dyn Display) -> String {
    format!("{ERROR_PREFIX}{err}")
}

/// Route the free-form reason to the field matching the outcome.
pub fn outcome_update(outcome: Outcome, reason: Option<String>) -> OutcomeUpdate {
    let mut update = OutcomeUpdate::new(outcome);
    match outcome {
        Outcome::Failed => update.failure_reason = reason,
        Outcome::Partial => update.limitation = reason,
        Outcome::Success | Outcome::Pending => {}
    }
    update
}

/// Run a validated call against the store.
pub async fn execute(store: &dyn MemoryStore, call: ToolCall) -> Result<String> {
    match call {
        ToolCall::Search { query, limit } => {
            let response = store
                .search(&query, SearchOptions::new(limit, TOOL_SEARCH_THRESHOLD))
                .await?;
            let results = response.map(|r| r.results).unwrap_or_default();
            Ok(format_search_results(&query, &results))
        }
        ToolCall::SaveDecision {
            topic,
            decision,
            reasoning,
            confidence,
        } => {
            let receipt = store
                .save(SaveRequest::decision(topic.clone(), decision, reasoning, confidence))
                .await?;
            Ok(format_save_receipt(&topic, confidence, &receipt))
        }
        ToolCall::SaveCheckpoint {
            summary,
            next_steps,
            open_files,
        } => {
            let id = store
                .save_checkpoint(&summary, &open_files, next_steps.as_deref().unwrap_or(""))
                .await?;
            Ok(format!("Checkpoint saved: {id}"))
        }
        ToolCall::LoadCheckpoint => Ok(store
            .load_checkpoint()
            .await?
            .map(|cp| format_checkpoint(&cp))
            .unwrap_or_else(|| "No checkpoint found.".to_string())),
        ToolCall::Update {
            id,
            outcome,
            reason,
        } => {
            let mut text = format!("Updated {id}: outcome = {outcome}");
            if let Some(r) = reason.as_deref().filter(|_| outcome != Outcome::Success) {
                text.push_str(&format!(" (reason: {r})"));
            }
            store.update_outcome(&id, outcome_update(outcome, reason)).await?;
            Ok(text)
        }
    }
}

pub fn format_search_results(query: &str, results: &[MemoryRecord]) -> String {
    if results.is_empty() {
        return format!("No decisions found for \"{query}\".");
    }

    let mut out = format!("Found {} decision(s) for \"{}\":", results.len(), query);
    for (i, record) in results.iter().enumerate() {
        out.push_str(&format!(
            "\n\n{}. [{}%] {}: {}",
            i + 1,
            similarity_percent(record),
            record.topic,
            record.decision
        ));
        if let Some(outcome) = record.outcome {
            out.push_str(&format!(" ({outcome})"));
        }
        for line in format_reasoning(&record.reasoning, TOOL_REASONING_CHARS).lines() {
            out.push_str(&format!("\n   {line}"));
        }
        out.push_str(&format!("\n   id: {}", record.id));
    }
    out
}

fn format_save_receipt(topic: &str, confidence: f32, receipt: &SaveReceipt) -> String {
    let mut out = format!(
        "Saved decision {} (topic: {}, confidence: {:.2})",
        receipt.id, topic, confidence
    );
    if let Some(warning) = &receipt.warning {
        out.push_str(&format!("\nWarning: {warning}"));
    }
    if !receipt.similar_decisions.is_empty() {
        out.push_str("\nSimilar decisions:");
        for record in &receipt.similar_decisions {
            out.push_str(&format!(
                "\n- [{}%] {}: {} [id: {}]",
                similarity_percent(record),
                record.topic,
                record.decision,
                record.id
            ));
        }
    }
    if let Some(hint) = &receipt.collaboration_hint {
        out.push_str(&format!("\nHint: {hint}"));
    }
    out
}

pub fn format_checkpoint(checkpoint: &Checkpoint) -> String {
    let mut out = format!(
        "Checkpoint {} ({})\nSummary:\n{}",
        checkpoint.id,
        format_timestamp(&checkpoint.timestamp),
        checkpoint.summary
    );
    if let Some(next) = &checkpoint.next_steps {
        out.push_str(&format!("\nNext steps:\n{next}"));
    }
    if !checkpoint.open_files.is_empty() {
        out.push_str(&format!("\nOpen files: {}", checkpoint.open_files.join(", ")));
    }
    out
}
