//! Plugin configuration and storage-location resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{RecallError, Result};

/// Environment variable overriding the storage location when no explicit
/// path is configured.
pub const STORAGE_PATH_ENV: &str = "RECALL_STORAGE_PATH";

/// Storage directory under the user's home when nothing else is configured.
pub const DEFAULT_STORAGE_DIR: &str = ".recall/memory";

/// Default minimum age of the latest checkpoint before `session_end` writes
/// a new one.
pub const DEFAULT_CHECKPOINT_STALENESS_MS: u64 = 5 * 60 * 1000;

/// Configuration handed over by the host, camelCase like other plugin config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallConfig {
    /// Explicit storage location; highest priority.
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
    /// Inject retrieved memory before each agent turn.
    #[serde(default = "default_true")]
    pub auto_recall: bool,
    /// Scan finished turns for candidate decisions.
    #[serde(default = "default_true")]
    pub auto_capture: bool,
    #[serde(default = "default_staleness")]
    pub checkpoint_staleness_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_staleness() -> u64 {
    DEFAULT_CHECKPOINT_STALENESS_MS
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            auto_recall: true,
            auto_capture: true,
            checkpoint_staleness_ms: DEFAULT_CHECKPOINT_STALENESS_MS,
        }
    }
}

impl RecallConfig {
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Parse host-provided JSON config; missing keys take defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Load config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RecallError::Initialization(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }
}

/// Resolve the storage location: explicit path, then the environment
/// override, then `<home>/.recall/memory`.
///
/// Blank values count as absent.
pub fn resolve_storage_path(
    explicit: Option<&Path>,
    env_override: Option<&str>,
    home: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(path.to_path_buf());
    }
    if let Some(value) = env_override.map(str::trim).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(value));
    }
    home.map(|h| h.join(DEFAULT_STORAGE_DIR)).ok_or_else(|| {
        RecallError::Initialization("no storage path configured and no home directory".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_priority() {
        let home = Path::new("/home/dev");

        let explicit = resolve_storage_path(Some(Path::new("/data/a")), Some("/env/b"), Some(home));
        assert_eq!(explicit.unwrap(), PathBuf::from("/data/a"));

        let env = resolve_storage_path(None, Some("/env/b"), Some(home));
        assert_eq!(env.unwrap(), PathBuf::from("/env/b"));

        let default = resolve_storage_path(None, None, Some(home));
        assert_eq!(default.unwrap(), PathBuf::from("/home/dev/.recall/memory"));
    }

    #[test]
    fn test_blank_values_fall_through() {
        let home = Path::new("/home/dev");
        let resolved = resolve_storage_path(Some(Path::new("")), Some("   "), Some(home));
        assert_eq!(resolved.unwrap(), PathBuf::from("/home/dev/.recall/memory"));
    }

    #[test]
    fn test_no_home_is_initialization_error() {
        let err = resolve_storage_path(None, None, None).unwrap_err();
        assert!(matches!(err, RecallError::Initialization(_)));
    }

    #[test]
    fn test_config_from_json_defaults() {
        let config = RecallConfig::from_json(r#"{"storagePath": "/tmp/mem"}"#).unwrap();
        assert_eq!(config.storage_path, Some(PathBuf::from("/tmp/mem")));
        assert!(config.auto_recall);
        assert!(config.auto_capture);
        assert_eq!(config.checkpoint_staleness_ms, 300_000);

        let config = RecallConfig::from_json(r#"{"autoCapture": false}"#).unwrap();
        assert!(!config.auto_capture);
        assert!(config.storage_path.is_none());
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recall.json");
        std::fs::write(&path, r#"{"checkpointStalenessMs": 1000}"#).unwrap();

        let config = RecallConfig::load(&path).unwrap();
        assert_eq!(config.checkpoint_staleness_ms, 1000);

        let missing = RecallConfig::load(&dir.path().join("nope.json"));
        assert!(missing.is_err());
    }
}
