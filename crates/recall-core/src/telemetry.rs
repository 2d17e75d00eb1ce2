//! Tracing setup for the `recall` binary.
//!
//! Logs always go to stderr because stdout carries the host protocol.
//! `RUST_LOG` replaces the default filter entirely.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Shape of emitted log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// Newline-delimited JSON
    Json,
}

/// Filter used when `RUST_LOG` is unset: recall crates at `level`,
/// dependencies (SurrealDB, tokio) at `warn`.
///
/// Target matching is by prefix, so `recall` also covers `recall_core` and
/// `recall_state`.
pub fn default_filter(level: Level) -> EnvFilter {
    EnvFilter::new(format!(
        "warn,recall={}",
        level.as_str().to_ascii_lowercase()
    ))
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed; the earlier one
/// stays in effect.
pub fn init_tracing(format: LogFormat, level: Level) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));

    let text = (format == LogFormat::Text)
        .then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));
    let json = (format == LogFormat::Json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init()
        .is_ok()
}
