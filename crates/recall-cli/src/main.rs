//! Recall CLI - session memory for agent hosts
//!
//! The `recall` command exposes the memory tools directly and bridges agent
//! hosts over stdio.
//!
//! ## Commands
//!
//! - `search`: Semantic search over recorded decisions
//! - `save-decision`: Record a decision with its reasoning
//! - `save-checkpoint`: Record a progress checkpoint
//! - `checkpoint`: Show the latest checkpoint
//! - `update`: Record how a decision played out
//! - `serve`: Speak newline-delimited JSON with a host on stdin/stdout

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, Level};

use recall_core::{
    Coordinator, HookOutput, LifecycleEvent, LogFormat, RecallConfig, TracingSink, ERROR_PREFIX,
};
use recall_state::SurrealConnector;

#[derive(Parser)]
#[command(name = "recall")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Session memory for AI agent hosts", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Memory storage directory (overrides config and RECALL_STORAGE_PATH)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// JSON config file (camelCase keys, as hosts pass plugin config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search recorded decisions
    Search {
        /// Free-text query
        query: String,

        /// Maximum number of results (capped at 20)
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Record a decision
    SaveDecision {
        /// Topic the decision belongs to
        #[arg(short, long)]
        topic: String,

        /// What was decided
        #[arg(short, long)]
        decision: String,

        /// Why; may carry `builds_on: <id>` style links
        #[arg(short, long)]
        reasoning: String,

        /// Confidence between 0.0 and 1.0 (default 0.8)
        #[arg(short, long)]
        confidence: Option<f64>,
    },

    /// Record a progress checkpoint
    SaveCheckpoint {
        /// What has been done so far
        summary: String,

        /// What to do next
        #[arg(short, long)]
        next_steps: Option<String>,

        /// File open at checkpoint time (repeatable)
        #[arg(long = "open-file")]
        open_files: Vec<String>,
    },

    /// Show the latest checkpoint
    Checkpoint,

    /// Record the outcome of a decision
    Update {
        /// Decision ID
        id: String,

        /// How it played out
        #[arg(value_parser = ["success", "failed", "partial"])]
        outcome: String,

        /// Failure reason or limitation
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Bridge a host over stdio, one JSON object per line
    Serve,
}

/// A tool call line from the host.
#[derive(Debug, Deserialize)]
struct ToolRequest {
    tool: String,
    #[serde(default)]
    params: Value,
}

/// One reply line to the host.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Reply {
    Hook(HookOutput),
    Text { text: String },
    Error { error: String },
    Empty,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    recall_core::init_tracing(format, level);

    let mut config = match &cli.config {
        Some(path) => RecallConfig::load(path).context("Failed to load config")?,
        None => RecallConfig::default(),
    };
    if let Some(storage) = cli.storage {
        config.storage_path = Some(storage);
    }

    let mut coordinator =
        Coordinator::new(config, Arc::new(SurrealConnector), Arc::new(TracingSink));

    match cli.command {
        Commands::Search { query, limit } => {
            cmd_tool(
                &mut coordinator,
                "search",
                json!({"query": query, "limit": limit}),
            )
            .await
        }
        Commands::SaveDecision {
            topic,
            decision,
            reasoning,
            confidence,
        } => {
            let mut params = json!({
                "type": "decision",
                "topic": topic,
                "decision": decision,
                "reasoning": reasoning,
            });
            if let Some(c) = confidence {
                params["confidence"] = json!(c);
            }
            cmd_tool(&mut coordinator, "save", params).await
        }
        Commands::SaveCheckpoint {
            summary,
            next_steps,
            open_files,
        } => {
            cmd_tool(
                &mut coordinator,
                "save",
                json!({
                    "type": "checkpoint",
                    "summary": summary,
                    "next_steps": next_steps,
                    "open_files": open_files,
                }),
            )
            .await
        }
        Commands::Checkpoint => cmd_tool(&mut coordinator, "load_checkpoint", json!({})).await,
        Commands::Update {
            id,
            outcome,
            reason,
        } => {
            cmd_tool(
                &mut coordinator,
                "update",
                json!({"id": id, "outcome": outcome, "reason": reason}),
            )
            .await
        }
        Commands::Serve => {
            info!("Serving host protocol on stdio");
            serve(
                &mut coordinator,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await
        }
    }
}

/// Run one tool and print its text; tool errors become a failing exit.
async fn cmd_tool(coordinator: &mut Coordinator, tool: &str, params: Value) -> Result<()> {
    let text = coordinator.invoke_tool(tool, &params).await;
    match text.strip_prefix(ERROR_PREFIX) {
        Some(message) => anyhow::bail!("{}", message),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}

/// Answer one protocol line.
async fn handle_line(coordinator: &mut Coordinator, line: &str) -> Reply {
    let raw: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            return Reply::Error {
                error: format!("malformed line: {}", e),
            }
        }
    };

    if raw.get("tool").is_some() {
        return match serde_json::from_value::<ToolRequest>(raw) {
            Ok(request) => Reply::Text {
                text: coordinator
                    .invoke_tool(&request.tool, &request.params)
                    .await,
            },
            Err(e) => Reply::Error {
                error: format!("malformed tool call: {}", e),
            },
        };
    }

    match LifecycleEvent::from_value(raw) {
        Ok(event) => match coordinator.dispatch(event).await {
            Some(output) => Reply::Hook(output),
            None => Reply::Empty,
        },
        Err(e) => Reply::Error {
            error: e.to_string(),
        },
    }
}

/// Read host lines until EOF, writing exactly one reply line per non-blank
/// input line.
async fn serve<R, W>(coordinator: &mut Coordinator, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(bytes = line.len(), "host line");

        let reply = handle_line(coordinator, line).await;
        let mut out = serde_json::to_string(&reply)?;
        out.push('\n');
        writer.write_all(out.as_bytes()).await?;
        writer.flush().await?;
    }
    info!("Host closed stdin; shutting down");
    Ok(())
}
