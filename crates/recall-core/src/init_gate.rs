//! Lazy, init-once access to the memory backend.
//!
//! Every event handler and tool call goes through [`InitGate::ensure_initialized`].
//! The first successful call fixes the storage location for the life of the
//! gate; later requests for a different location are logged and ignored.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use recall_state::{MemoryStore, StoreConnector};

use crate::domain::config::{resolve_storage_path, STORAGE_PATH_ENV};
use crate::domain::{RecallError, Result};
use crate::obs::LogSink;

const LOG_EVENT: &str = "init";

struct Initialized {
    resolved_storage_path: PathBuf,
    store: Arc<dyn MemoryStore>,
}

/// Resolves and connects the backend exactly once.
pub struct InitGate {
    connector: Arc<dyn StoreConnector>,
    sink: Arc<dyn LogSink>,
    env_override: Option<String>,
    home: Option<PathBuf>,
    state: Option<Initialized>,
}

impl InitGate {
    /// Gate reading `RECALL_STORAGE_PATH` and the home directory from the
    /// process environment.
    pub fn new(connector: Arc<dyn StoreConnector>, sink: Arc<dyn LogSink>) -> Self {
        Self::with_environment(
            connector,
            sink,
            std::env::var(STORAGE_PATH_ENV).ok(),
            dirs::home_dir(),
        )
    }

    /// Gate with an explicit environment snapshot.
    pub fn with_environment(
        connector: Arc<dyn StoreConnector>,
        sink: Arc<dyn LogSink>,
        env_override: Option<String>,
        home: Option<PathBuf>,
    ) -> Self {
        Self {
            connector,
            sink,
            env_override,
            home,
            state: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Storage location in effect, once initialized.
    pub fn storage_path(&self) -> Option<&Path> {
        self.state.as_ref().map(|s| s.resolved_storage_path.as_path())
    }

    /// Return the backend, connecting on first use.
    ///
    /// A failed connection leaves the gate uninitialized, so the next call
    /// makes a fresh attempt.
    pub async fn ensure_initialized(
        &mut self,
        requested: Option<&Path>,
    ) -> Result<Arc<dyn MemoryStore>> {
        if let Some(state) = &self.state {
            if let Some(path) = requested {
                if path != state.resolved_storage_path {
                    self.sink.warn(
                        LOG_EVENT,
                        &format!(
                            "storage path {} ignored; already initialized with {}",
                            path.display(),
                            state.resolved_storage_path.display()
                        ),
                    );
                }
            }
            return Ok(state.store.clone());
        }

        let resolved =
            resolve_storage_path(requested, self.env_override.as_deref(), self.home.as_deref())?;

        let store = self.connector.connect(&resolved).await.map_err(|e| {
            RecallError::Initialization(format!("{}: {}", resolved.display(), e))
        })?;

        self.sink.info(
            LOG_EVENT,
            &format!("memory backend ready at {}", resolved.display()),
        );
        self.state = Some(Initialized {
            resolved_storage_path: resolved,
            store: store.clone(),
        });
        Ok(store)
    }
}
