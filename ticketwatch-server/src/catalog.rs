use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use ticketwatch_common::{AvailabilityRecord, EventId, EventStatus};

/// An event offered for booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEvent {
    pub id: EventId,
    pub title: String,
    pub capacity: i64,
    #[serde(default)]
    pub booked: i64,
    #[serde(default)]
    pub status: EventStatus,
}

impl CatalogEvent {
    pub fn new(id: EventId, title: &str, capacity: i64, booked: i64) -> Self {
        Self {
            id,
            title: title.to_string(),
            capacity,
            booked,
            status: EventStatus::Active,
        }
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    fn availability(&self, now: DateTime<Utc>) -> AvailabilityRecord {
        AvailabilityRecord::from_counts(self.id, self.capacity, self.booked, self.status.as_str(), now)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BookingError {
    #[error("Event {0} not found")]
    NotFound(EventId),

    #[error("Event {0} is not open for booking")]
    NotBookable(EventId),

    #[error("Only {available} tickets left for event {event_id}")]
    Insufficient { event_id: EventId, available: i64 },

    #[error("Quantity must be at least 1")]
    InvalidQuantity,
}

/// In-memory events with their booked ticket counts
pub struct Catalog {
    events: RwLock<BTreeMap<EventId, CatalogEvent>>,
}

impl Catalog {
    pub fn new(events: Vec<CatalogEvent>) -> Self {
        let events = events.into_iter().map(|event| (event.id, event)).collect();
        Self {
            events: RwLock::new(events),
        }
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn availability(&self, event_id: EventId, now: DateTime<Utc>) -> Option<AvailabilityRecord> {
        let events = self.events.read().await;
        events.get(&event_id).map(|event| event.availability(now))
    }

    /// Availability of the requested events; unknown ids are skipped
    pub async fn availability_many(
        &self,
        event_ids: &[EventId],
        now: DateTime<Utc>,
    ) -> BTreeMap<EventId, AvailabilityRecord> {
        let events = self.events.read().await;
        event_ids
            .iter()
            .filter_map(|id| events.get(id))
            .map(|event| (event.id, event.availability(now)))
            .collect()
    }

    pub async fn active_availability(&self, now: DateTime<Utc>) -> BTreeMap<EventId, AvailabilityRecord> {
        let events = self.events.read().await;
        events
            .values()
            .filter(|event| event.status == EventStatus::Active)
            .map(|event| (event.id, event.availability(now)))
            .collect()
    }

    /// Book `quantity` tickets, refusing to oversell
    pub async fn book(&self, event_id: EventId, quantity: i64) -> Result<AvailabilityRecord, BookingError> {
        if quantity < 1 {
            return Err(BookingError::InvalidQuantity);
        }

        let mut events = self.events.write().await;
        let event = events.get_mut(&event_id).ok_or(BookingError::NotFound(event_id))?;

        if !event.status.is_bookable() {
            return Err(BookingError::NotBookable(event_id));
        }
        let available = event.capacity - event.booked;
        if quantity > available {
            return Err(BookingError::Insufficient { event_id, available });
        }

        event.booked += quantity;
        tracing::info!(
            "Booked {} tickets for event {} ({}/{})",
            quantity,
            event_id,
            event.booked,
            event.capacity
        );

        Ok(event.availability(Utc::now()))
    }
}
