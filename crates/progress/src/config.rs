//! Engine and application configuration.

use std::path::Path;
use std::time::Duration;
use goalsync_storage::StoreConfig;
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Error loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed config file
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reconciler cadence and history settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fast (UI) tick interval in milliseconds
    pub fast_tick_ms: u64,

    /// Slow (durability) tick interval in seconds
    pub slow_tick_secs: u64,

    /// Snapshots kept per goal
    pub history_limit: usize,

    /// Completion event channel capacity
    pub event_capacity: usize,

    /// Record a history snapshot after each persisted progress change
    pub record_history: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fast_tick_ms: 1000,
            slow_tick_secs: 30,
            history_limit: 100,
            event_capacity: 64,
            record_history: true,
        }
    }
}

impl EngineConfig {
    /// Fast tick period.
    pub fn fast_tick(&self) -> Duration {
        Duration::from_millis(self.fast_tick_ms.max(1))
    }

    /// Slow tick period.
    pub fn slow_tick(&self) -> Duration {
        Duration::from_secs(self.slow_tick_secs.max(1))
    }
}

/// Everything the CLI needs to build an engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Engine settings
    pub engine: EngineConfig,

    /// Store settings
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match fs::read_to_string(path.as_ref()).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"engine": {"slow_tick_secs": 5}}"#).unwrap();
        assert_eq!(config.engine.slow_tick_secs, 5);
        assert_eq!(config.engine.fast_tick_ms, 1000);
        assert_eq!(config.engine.history_limit, 100);
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn test_zero_intervals_are_clamped() {
        let config = EngineConfig {
            fast_tick_ms: 0,
            slow_tick_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.fast_tick(), Duration::from_millis(1));
        assert_eq!(config.slow_tick(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("config.json")).await.unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
