use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::catalog::CatalogEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Interface to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind the server to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS for cross-origin requests
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    /// Events served by the availability API
    #[serde(default)]
    pub events: Vec<CatalogEvent>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_enable_cors() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let mut seen = std::collections::HashSet::new();
        for event in &self.events {
            if !seen.insert(event.id) {
                anyhow::bail!("Duplicate event id {}", event.id);
            }
            if event.capacity < 0 || event.booked < 0 {
                anyhow::bail!("Event {} has negative capacity or booked count", event.id);
            }
            if event.booked > event.capacity {
                anyhow::bail!("Event {} is booked beyond its capacity", event.id);
            }
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use ticketwatch_common::EventStatus;

    fn write_config(content: &str) -> (TempDir, std::path::PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        (temp_dir, path)
    }

    #[test]
    fn test_load_events() {
        let (_dir, path) = write_config(
            r#"
port = 9100

[[events]]
id = 1
title = "Opening Night"
capacity = 1500
booked = 420

[[events]]
id = 3
title = "Finale"
capacity = 800
status = "cancelled"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server_address(), "127.0.0.1:9100");
        assert!(config.enable_cors);
        assert_eq!(config.events.len(), 2);
        assert_eq!(config.events[0].booked, 420);
        assert_eq!(config.events[1].booked, 0);
        assert_eq!(config.events[1].status, EventStatus::Cancelled);
    }

    #[test]
    fn test_rejects_overbooked_event() {
        let (_dir, path) = write_config(
            r#"
[[events]]
id = 1
title = "Opening Night"
capacity = 10
booked = 11
"#,
        );

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let (_dir, path) = write_config(
            r#"
[[events]]
id = 1
title = "A"
capacity = 10

[[events]]
id = 1
title = "B"
capacity = 10
"#,
        );

        assert!(Config::load(&path).is_err());
    }
}
