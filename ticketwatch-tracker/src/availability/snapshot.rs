use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use ticketwatch_common::{AvailabilityRecord, EventId, occupancy_percentage};

/// Occupancy from which an event counts as almost sold out
pub const ALMOST_SOLD_OUT_PERCENTAGE: f64 = 90.0;

/// Point-in-time capacity and booking numbers of one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    pub event_id: EventId,
    pub total_capacity: i64,
    pub booked_tickets: i64,
    pub available_tickets: i64,
    pub occupancy_percentage: f64,
    pub is_sold_out: bool,
    pub is_almost_sold_out: bool,
    pub event_status: String,
    pub last_updated: DateTime<Utc>,
}

/// Published availability of every tracked event. Each publication is a new map.
pub type SnapshotMap = Arc<HashMap<EventId, AvailabilitySnapshot>>;

impl AvailabilitySnapshot {
    /// Derive a snapshot from capacity and booked counts
    pub fn from_counts(
        event_id: EventId,
        total_capacity: i64,
        booked_tickets: i64,
        event_status: impl Into<String>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        let available_tickets = total_capacity - booked_tickets;
        let occupancy = occupancy_percentage(total_capacity, booked_tickets);

        Self {
            event_id,
            total_capacity,
            booked_tickets,
            available_tickets,
            occupancy_percentage: occupancy,
            is_sold_out: available_tickets <= 0,
            is_almost_sold_out: occupancy >= ALMOST_SOLD_OUT_PERCENTAGE,
            event_status: event_status.into(),
            last_updated,
        }
    }

    /// Normalize an API record. A record without timestamp is stamped with `fetched_at`.
    pub fn from_record(record: AvailabilityRecord, fetched_at: DateTime<Utc>) -> Self {
        Self {
            event_id: record.event_id,
            total_capacity: record.total_capacity,
            booked_tickets: record.booked_tickets,
            available_tickets: record.available_tickets,
            occupancy_percentage: record.occupancy_percentage,
            is_sold_out: record.is_sold_out || record.available_tickets <= 0,
            is_almost_sold_out: record.is_almost_sold_out,
            event_status: record.event_status,
            last_updated: record.last_updated.unwrap_or(fetched_at),
        }
    }

    /// Inconsistencies between the reported numbers. Empty when the snapshot is sound.
    pub fn quality_issues(&self) -> Vec<&'static str> {
        let mut issues = Vec::new();

        if self.total_capacity < 0 {
            issues.push("negative capacity");
        }
        if self.booked_tickets < 0 {
            issues.push("negative booked count");
        }
        if self.booked_tickets > self.total_capacity {
            issues.push("booked tickets exceed capacity");
        }
        if self.available_tickets != self.total_capacity - self.booked_tickets {
            issues.push("available tickets do not match capacity minus booked");
        }
        let expected = occupancy_percentage(self.total_capacity, self.booked_tickets);
        if (self.occupancy_percentage - expected).abs() > 0.01 {
            issues.push("occupancy does not match booked share");
        }

        issues
    }
}
