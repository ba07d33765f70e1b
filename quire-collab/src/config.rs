//! Sync and presence configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::overlay::DecorationStyle;

/// Tunables for sessions, presence and the cursor overlay.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Push attempts made by `push_with_retry` before giving up
    pub push_retry_limit: u32,
    /// Minimum gap between local cursor broadcasts in milliseconds (0 = every move)
    pub presence_interval_ms: u64,
    /// Snapshots buffered per presence subscriber
    pub presence_capacity: usize,
    /// How remote cursors are drawn
    pub decoration_style: DecorationStyle,
    /// Only draw participants whose presence names the active document
    pub filter_by_document: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            push_retry_limit: 5,
            presence_interval_ms: 0,
            presence_capacity: 64,
            decoration_style: DecorationStyle::Widget,
            filter_by_document: true,
        }
    }
}

impl SyncConfig {
    /// Small buffers and a few retries, for tests.
    pub fn for_testing() -> Self {
        Self {
            push_retry_limit: 3,
            presence_interval_ms: 0,
            presence_capacity: 8,
            ..Self::default()
        }
    }

    /// Parse a (possibly partial) JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn presence_interval(&self) -> Duration {
        Duration::from_millis(self.presence_interval_ms)
    }

    /// Retry limit, never below one attempt.
    pub fn push_attempts(&self) -> u32 {
        self.push_retry_limit.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.push_retry_limit, 5);
        assert_eq!(config.presence_interval(), Duration::ZERO);
        assert!(config.filter_by_document);
        assert_eq!(config.decoration_style, DecorationStyle::Widget);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            SyncConfig::from_json_str(r#"{"push_retry_limit": 9, "decoration_style": "mark"}"#)
                .unwrap();
        assert_eq!(config.push_retry_limit, 9);
        assert_eq!(config.decoration_style, DecorationStyle::Mark);
        assert_eq!(config.presence_capacity, 64);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(
            SyncConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_push_attempts_at_least_one() {
        let config = SyncConfig {
            push_retry_limit: 0,
            ..SyncConfig::default()
        };
        assert_eq!(config.push_attempts(), 1);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quire.json");
        std::fs::write(&path, r#"{"presence_interval_ms": 33}"#).unwrap();

        let config = SyncConfig::load(&path).unwrap();
        assert_eq!(config.presence_interval(), Duration::from_millis(33));
    }
}
