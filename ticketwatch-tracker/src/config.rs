use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use ticketwatch_common::EventId;

use crate::availability::SourceMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub mode: SourceMode,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Faster cadence used while most tracked events are close to selling out
    #[serde(default)]
    pub hot_poll_interval_secs: Option<u64>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Fixed seed for the simulated source
    #[serde(default)]
    pub mock_seed: Option<u64>,

    #[serde(default)]
    pub event_ids: Vec<EventId>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:8000/api/v1".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            mode: SourceMode::default(),
            api_base_url: default_api_base_url(),
            poll_interval_secs: default_poll_interval_secs(),
            hot_poll_interval_secs: None,
            request_timeout_secs: default_request_timeout_secs(),
            mock_seed: None,
            event_ids: Vec::new(),
        }
    }
}

impl WatcherConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: WatcherConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than zero");
        }
        if self.hot_poll_interval_secs == Some(0) {
            anyhow::bail!("hot_poll_interval_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn hot_poll_interval(&self) -> Option<Duration> {
        self.hot_poll_interval_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let config = WatcherConfig::from_file(&path).unwrap();
        assert_eq!(config.mode, SourceMode::Simulated);
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.hot_poll_interval(), None);
        assert!(config.event_ids.is_empty());
    }

    #[test]
    fn test_read_full_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
log_level = "debug"
mode = "live"
api_base_url = "http://tickets.local/api/v1"
poll_interval_secs = 30
hot_poll_interval_secs = 5
mock_seed = 42
event_ids = [4, 8]
"#,
        )
        .unwrap();

        let config = WatcherConfig::from_file(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.mode, SourceMode::Live);
        assert_eq!(config.api_base_url, "http://tickets.local/api/v1");
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.hot_poll_interval(), Some(Duration::from_secs(5)));
        assert_eq!(config.mock_seed, Some(42));
        assert_eq!(config.event_ids, vec![4, 8]);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "poll_interval_secs = 0").unwrap();

        assert!(WatcherConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(WatcherConfig::from_file(temp_dir.path().join("nope.toml")).is_err());
    }
}
