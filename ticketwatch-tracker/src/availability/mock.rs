//! Simulated availability for local development.
//!
//! Every fetch draws a fresh booked share per event so that consumers see
//! numbers move between polling cycles.

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Mutex;

use ticketwatch_common::EventId;

use super::snapshot::AvailabilitySnapshot;
use super::source::{AvailabilitySource, FetchError};

const BASE_CAPACITY: i64 = 1000;
const CAPACITY_PER_ID: i64 = 500;
const MIN_BOOKED_FRACTION: f64 = 0.1;
const MAX_BOOKED_FRACTION: f64 = 0.9;

pub struct MockAvailabilitySource {
    rng: Mutex<StdRng>,
}

impl MockAvailabilitySource {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible source for tests and demos
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Capacity grows with the id: `1000 + id * 500`
    pub fn capacity_for(event_id: EventId) -> i64 {
        let id = i64::try_from(event_id).unwrap_or(i64::MAX);
        id.saturating_mul(CAPACITY_PER_ID).saturating_add(BASE_CAPACITY)
    }
}

impl Default for MockAvailabilitySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AvailabilitySource for MockAvailabilitySource {
    async fn fetch(&self, event_ids: &[EventId]) -> Result<HashMap<EventId, AvailabilitySnapshot>, FetchError> {
        let now = Utc::now();
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let snapshots = event_ids
            .iter()
            .map(|&event_id| {
                let capacity = Self::capacity_for(event_id);
                let fraction = rng.gen_range(MIN_BOOKED_FRACTION..MAX_BOOKED_FRACTION);
                let booked = (capacity as f64 * fraction).floor() as i64;
                let snapshot = AvailabilitySnapshot::from_counts(event_id, capacity, booked, "active", now);
                (event_id, snapshot)
            })
            .collect();

        Ok(snapshots)
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_for() {
        assert_eq!(MockAvailabilitySource::capacity_for(0), 1000);
        assert_eq!(MockAvailabilitySource::capacity_for(3), 2500);
        assert_eq!(MockAvailabilitySource::capacity_for(u64::MAX), i64::MAX);
    }

    #[tokio::test]
    async fn test_generated_snapshots_are_consistent() {
        let source = MockAvailabilitySource::with_seed(7);

        for _ in 0..50 {
            let snapshots = source.fetch(&[1, 2, 10]).await.unwrap();
            assert_eq!(snapshots.len(), 3);

            for (id, snapshot) in &snapshots {
                assert_eq!(snapshot.event_id, *id);
                assert_eq!(snapshot.total_capacity, MockAvailabilitySource::capacity_for(*id));
                assert!(snapshot.booked_tickets <= snapshot.total_capacity);
                assert!(snapshot.occupancy_percentage >= 9.9);
                assert!(snapshot.occupancy_percentage < 90.0);
                assert!(!snapshot.is_sold_out);
                assert!(snapshot.quality_issues().is_empty());
                assert_eq!(snapshot.event_status, "active");
            }
        }
    }

    #[tokio::test]
    async fn test_seeded_sources_agree() {
        let first = MockAvailabilitySource::with_seed(42);
        let second = MockAvailabilitySource::with_seed(42);

        let a = first.fetch(&[5]).await.unwrap();
        let b = second.fetch(&[5]).await.unwrap();
        assert_eq!(a[&5].booked_tickets, b[&5].booked_tickets);
    }
}
