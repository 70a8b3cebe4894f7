//! Follower configuration
//!
//! Loaded from JSON; every field has a default:
//!
//! ```json
//! { "server_id": 1, "shard_index": 0, "poll_interval_ms": 250, "on_corruption": "skip" }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{ReplicationError, ReplicationResult};
use crate::ulog::RecordFilter;

/// What a follower does with a record that fails to decode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptionPolicy {
    /// Stop and report the error
    #[default]
    Halt,
    /// Log the record and continue with the next one
    Skip,
}

/// Follower configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Tags this follower's log output (random if absent)
    #[serde(default = "Uuid::new_v4")]
    pub follower_id: Uuid,

    /// Only apply records from this server (None: any)
    #[serde(default)]
    pub server_id: Option<u64>,

    /// Only apply records for this shard (None: any)
    #[serde(default)]
    pub shard_index: Option<u64>,

    /// Longest single wait for new records
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Skip records older than this timestamp (ms since the Unix epoch)
    #[serde(default)]
    pub start_timestamp: i64,

    /// Halt or skip on a damaged record (default: halt)
    #[serde(default)]
    pub on_corruption: CorruptionPolicy,
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            follower_id: Uuid::new_v4(),
            server_id: None,
            shard_index: None,
            poll_interval_ms: default_poll_interval_ms(),
            start_timestamp: 0,
            on_corruption: CorruptionPolicy::Halt,
        }
    }
}

impl ReplicationConfig {
    /// Follow records from one server and shard only
    pub fn exact(server_id: u64, shard_index: u64) -> Self {
        Self {
            server_id: Some(server_id),
            shard_index: Some(shard_index),
            ..Self::default()
        }
    }

    /// Load and validate a JSON configuration file
    pub fn load(path: &Path) -> ReplicationResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReplicationError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> ReplicationResult<Self> {
        let config: ReplicationConfig = serde_json::from_str(json)
            .map_err(|e| ReplicationError::InvalidConfig(format!("invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject a zero poll interval or a negative start timestamp
    pub fn validate(&self) -> ReplicationResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(ReplicationError::InvalidConfig(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.start_timestamp < 0 {
            return Err(ReplicationError::InvalidConfig(format!(
                "start_timestamp {} is negative",
                self.start_timestamp
            )));
        }
        Ok(())
    }

    /// Record filter built from `server_id` and `shard_index`
    pub fn filter(&self) -> RecordFilter {
        RecordFilter::new(self.server_id, self.shard_index)
    }

    /// `poll_interval_ms` as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = ReplicationConfig::from_json("{}").unwrap();
        assert_eq!(config.server_id, None);
        assert_eq!(config.shard_index, None);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.start_timestamp, 0);
        assert_eq!(config.on_corruption, CorruptionPolicy::Halt);
        assert_eq!(config.filter(), RecordFilter::any());
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = ReplicationConfig::default();
        let b = ReplicationConfig::default();
        assert_ne!(a.follower_id, b.follower_id);
    }

    #[test]
    fn test_all_fields() {
        let config = ReplicationConfig::from_json(
            r#"{
                "follower_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
                "server_id": 333333,
                "shard_index": 999,
                "poll_interval_ms": 5,
                "start_timestamp": 1700000000000,
                "on_corruption": "skip"
            }"#,
        )
        .unwrap();
        assert_eq!(
            config.follower_id.to_string(),
            "67e55044-10b1-426f-9247-bb680e5fe0c8"
        );
        assert_eq!(config.filter(), RecordFilter::exact(333333, 999));
        assert_eq!(config.on_corruption, CorruptionPolicy::Skip);
        assert_eq!(config.start_timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let err = ReplicationConfig::from_json(r#"{"poll_interval_ms": 0}"#).unwrap_err();
        assert_eq!(err.code(), "KV_REPL_INVALID_CONFIG");
    }

    #[test]
    fn test_rejects_unknown_policy() {
        assert!(ReplicationConfig::from_json(r#"{"on_corruption": "ignore"}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("follower.json");
        fs::write(&path, r#"{"shard_index": 3}"#).unwrap();
        let config = ReplicationConfig::load(&path).unwrap();
        assert_eq!(config.filter(), RecordFilter::new(None, Some(3)));
    }
}
