use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Event identifier as used by the availability API
pub type EventId = u64;

/// Lifecycle status of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EventStatus {
    #[default]
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "completed")]
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Active => "active",
            EventStatus::Cancelled => "cancelled",
            EventStatus::Completed => "completed",
        }
    }

    /// Only active events accept bookings
    pub fn is_bookable(&self) -> bool {
        matches!(self, EventStatus::Active)
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(EventStatus::Active),
            "cancelled" | "canceled" => Ok(EventStatus::Cancelled),
            "completed" => Ok(EventStatus::Completed),
            _ => Err(format!("Unknown event status: {}", s)),
        }
    }
}

/// Availability of one event as served by the availability API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub event_id: EventId,
    pub total_capacity: i64,
    pub booked_tickets: i64,
    pub available_tickets: i64,
    pub occupancy_percentage: f64,
    pub is_sold_out: bool,
    pub is_almost_sold_out: bool,
    pub event_status: String,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl AvailabilityRecord {
    /// Build a record from raw capacity and booked counts.
    ///
    /// An event counts as almost sold out once at most 10% of its capacity
    /// is left.
    pub fn from_counts(
        event_id: EventId,
        total_capacity: i64,
        booked_tickets: i64,
        event_status: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let available_tickets = total_capacity - booked_tickets;
        let occupancy = (occupancy_percentage(total_capacity, booked_tickets) * 100.0).round() / 100.0;

        Self {
            event_id,
            total_capacity,
            booked_tickets,
            available_tickets,
            occupancy_percentage: occupancy,
            is_sold_out: available_tickets <= 0,
            is_almost_sold_out: (available_tickets as f64) <= total_capacity as f64 * 0.1,
            event_status: event_status.into(),
            last_updated: Some(now),
        }
    }
}

/// Batched availability response, keyed by event id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipleAvailability {
    pub events: BTreeMap<EventId, AvailabilityRecord>,
    pub last_updated: DateTime<Utc>,
}

/// Envelope wrapping every availability API payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Share of capacity that is booked, in percent. Zero for zero capacity.
pub fn occupancy_percentage(total_capacity: i64, booked_tickets: i64) -> f64 {
    if total_capacity > 0 {
        booked_tickets as f64 / total_capacity as f64 * 100.0
    } else {
        0.0
    }
}
