//! Availability source backed by the availability HTTP API

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use ticketwatch_common::{ApiResponse, AvailabilityRecord, EventId};

use super::snapshot::AvailabilitySnapshot;
use super::source::{AvailabilitySource, FetchError};

/// Batched response with entries kept raw so they can be decoded one by one
#[derive(Debug, Deserialize)]
struct RawMultipleAvailability {
    #[serde(default)]
    events: Option<HashMap<String, serde_json::Value>>,
}

pub struct HttpAvailabilitySource {
    client: Client,
    base_url: String,
}

impl HttpAvailabilitySource {
    /// Create a source for the API rooted at `base_url`, e.g. `http://host:8000/api/v1`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ticketwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn availability_url(&self, event_ids: &[EventId]) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!("{}/availability", self.base_url))
            .map_err(|e| FetchError::Rejected(format!("invalid base URL {}: {}", self.base_url, e)))?;
        {
            let mut query = url.query_pairs_mut();
            for id in event_ids {
                query.append_pair("event_ids", &id.to_string());
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl AvailabilitySource for HttpAvailabilitySource {
    async fn fetch(&self, event_ids: &[EventId]) -> Result<HashMap<EventId, AvailabilitySnapshot>, FetchError> {
        if event_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = self.availability_url(event_ids)?;
        tracing::debug!("Fetching availability from {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let snapshots = decode_response(&body, Utc::now())?;

        tracing::debug!("Received availability for {}/{} events", snapshots.len(), event_ids.len());
        Ok(snapshots)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Decode a batched availability body. A success envelope without events yields an empty map.
fn decode_response(
    body: &[u8],
    fetched_at: chrono::DateTime<Utc>,
) -> Result<HashMap<EventId, AvailabilitySnapshot>, FetchError> {
    let envelope: ApiResponse<RawMultipleAvailability> = serde_json::from_slice(body)?;
    if !envelope.success {
        return Err(FetchError::Rejected(envelope.message));
    }

    let events = envelope.data.and_then(|data| data.events).unwrap_or_default();
    Ok(decode_entries(events, fetched_at))
}

/// Decode every entry on its own so one malformed event does not discard the batch
fn decode_entries(
    events: HashMap<String, serde_json::Value>,
    fetched_at: chrono::DateTime<Utc>,
) -> HashMap<EventId, AvailabilitySnapshot> {
    let mut snapshots = HashMap::with_capacity(events.len());

    for (key, value) in events {
        let Ok(event_id) = key.parse::<EventId>() else {
            tracing::warn!("Skipping availability entry with invalid event id key {:?}", key);
            continue;
        };

        let record = match serde_json::from_value::<AvailabilityRecord>(value) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping malformed availability entry for event {}: {}", key, e);
                continue;
            }
        };

        if record.event_id != event_id {
            tracing::warn!(
                "Availability entry keyed {} reports event {}, filing it under {}",
                key,
                record.event_id,
                event_id
            );
        }

        let mut snapshot = AvailabilitySnapshot::from_record(record, fetched_at);
        snapshot.event_id = event_id;
        let issues = snapshot.quality_issues();
        if !issues.is_empty() {
            tracing::warn!("Inconsistent availability for event {}: {}", snapshot.event_id, issues.join(", "));
        }
        snapshots.insert(event_id, snapshot);
    }

    snapshots
}
