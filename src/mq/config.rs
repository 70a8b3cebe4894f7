//! Message queue configuration
//!
//! Loaded from JSON. Only `path_prefix` is required:
//!
//! ```json
//! { "path_prefix": "/var/lib/kv/ulog", "max_file_size": 1048576, "sync": true }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{MqError, MqResult};

/// How existing segments are treated on open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Keep existing segments and continue after their last record
    #[default]
    Default,
    /// Delete existing segments and start empty
    Truncate,
}

/// Queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Segment files are named `<path_prefix>.<index>`
    pub path_prefix: PathBuf,

    /// A new segment is started once the current one reaches this size
    /// (default 1 GiB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Open mode (default: keep existing segments)
    #[serde(default)]
    pub mode: OpenMode,

    /// fsync after every append (default: false)
    #[serde(default)]
    pub sync: bool,
}

fn default_max_file_size() -> u64 {
    1 << 30
}

impl QueueConfig {
    /// Configuration with defaults for everything but the prefix
    pub fn new(path_prefix: impl Into<PathBuf>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            max_file_size: default_max_file_size(),
            mode: OpenMode::Default,
            sync: false,
        }
    }

    /// Set the segment size limit
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Set the open mode
    pub fn with_mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable or disable fsync per append
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Load and validate a JSON configuration file
    pub fn load(path: &Path) -> MqResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| MqError::io(format!("failed to read {}", path.display()), e))?;
        Self::from_json(&content)
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> MqResult<Self> {
        let config: QueueConfig = serde_json::from_str(json)
            .map_err(|e| MqError::InvalidConfig(format!("invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> MqResult<()> {
        if self.path_prefix.file_name().is_none() {
            return Err(MqError::InvalidConfig(format!(
                "path_prefix '{}' has no file name component",
                self.path_prefix.display()
            )));
        }
        if self.max_file_size == 0 {
            return Err(MqError::InvalidConfig(
                "max_file_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply() {
        let config = QueueConfig::from_json(r#"{"path_prefix": "/tmp/ulog"}"#).unwrap();
        assert_eq!(config, QueueConfig::new("/tmp/ulog"));
        assert_eq!(config.max_file_size, 1 << 30);
        assert_eq!(config.mode, OpenMode::Default);
        assert!(!config.sync);
    }

    #[test]
    fn test_all_fields() {
        let config = QueueConfig::from_json(
            r#"{"path_prefix": "/tmp/ulog", "max_file_size": 4096, "mode": "truncate", "sync": true}"#,
        )
        .unwrap();
        assert_eq!(config.max_file_size, 4096);
        assert_eq!(config.mode, OpenMode::Truncate);
        assert!(config.sync);
    }

    #[test]
    fn test_rejects_zero_file_size() {
        let err = QueueConfig::from_json(r#"{"path_prefix": "/tmp/ulog", "max_file_size": 0}"#)
            .unwrap_err();
        assert_eq!(err.code(), "KV_MQ_INVALID_CONFIG");
    }

    #[test]
    fn test_rejects_missing_prefix() {
        assert!(QueueConfig::from_json("{}").is_err());
        assert!(QueueConfig::new("/").validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("queue.json");
        fs::write(&path, r#"{"path_prefix": "/tmp/ulog", "sync": true}"#).unwrap();
        let config = QueueConfig::load(&path).unwrap();
        assert!(config.sync);
    }
}
