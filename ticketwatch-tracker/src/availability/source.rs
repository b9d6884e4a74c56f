use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use ticketwatch_common::EventId;

use super::http::HttpAvailabilitySource;
use super::mock::MockAvailabilitySource;
use super::snapshot::AvailabilitySnapshot;
use crate::config::WatcherConfig;

/// Errors produced while fetching availability
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("availability API rejected the request: {0}")]
    Rejected(String),

    #[error("failed to decode availability response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Provider of batched availability snapshots
#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    /// Fetch snapshots for `event_ids`.
    ///
    /// Ids the source knows nothing about are left out of the result.
    async fn fetch(&self, event_ids: &[EventId]) -> Result<HashMap<EventId, AvailabilitySnapshot>, FetchError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Where availability data comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SourceMode {
    /// Poll the availability API
    #[serde(rename = "live")]
    Live,
    /// Generate random bookings locally
    #[default]
    #[serde(rename = "simulated")]
    Simulated,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Live => "live",
            SourceMode::Simulated => "simulated",
        }
    }
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "live" | "api" => Ok(SourceMode::Live),
            "simulated" | "mock" | "dev" => Ok(SourceMode::Simulated),
            _ => Err(format!("Unknown source mode: {}", s)),
        }
    }
}

/// Build the source selected by `config.mode`
pub fn build_source(config: &WatcherConfig) -> Result<Arc<dyn AvailabilitySource>, FetchError> {
    let source: Arc<dyn AvailabilitySource> = match config.mode {
        SourceMode::Live => Arc::new(HttpAvailabilitySource::new(
            &config.api_base_url,
            config.request_timeout(),
        )?),
        SourceMode::Simulated => match config.mock_seed {
            Some(seed) => Arc::new(MockAvailabilitySource::with_seed(seed)),
            None => Arc::new(MockAvailabilitySource::new()),
        },
    };

    tracing::info!("Using {} availability source", source.name());
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_mode_parse() {
        assert_eq!("LIVE".parse::<SourceMode>(), Ok(SourceMode::Live));
        assert_eq!("mock".parse::<SourceMode>(), Ok(SourceMode::Simulated));
        assert!("offline".parse::<SourceMode>().is_err());
        assert_eq!(SourceMode::Simulated.to_string(), "simulated");
    }

    #[test]
    fn test_build_source_by_mode() {
        let mut config = WatcherConfig::default();
        assert_eq!(build_source(&config).unwrap().name(), "simulated");

        config.mode = SourceMode::Live;
        assert_eq!(build_source(&config).unwrap().name(), "http");
    }
}
