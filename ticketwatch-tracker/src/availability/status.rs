use serde::{Deserialize, Serialize};

use super::snapshot::AvailabilitySnapshot;

/// Occupancy from which availability is reported as limited
pub const LIMITED_AVAILABILITY_PERCENTAGE: f64 = 75.0;

/// Display classification of an event's availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AvailabilityStatus {
    /// No snapshot received yet
    Loading,
    SoldOut,
    AlmostSoldOut,
    LimitedAvailability,
    Available,
}

impl AvailabilityStatus {
    /// Classify a snapshot. The first matching rule wins:
    /// missing, sold out, almost sold out, occupancy >= 75%, otherwise available.
    pub fn classify(snapshot: Option<&AvailabilitySnapshot>) -> Self {
        let Some(snapshot) = snapshot else {
            return AvailabilityStatus::Loading;
        };

        if snapshot.is_sold_out {
            AvailabilityStatus::SoldOut
        } else if snapshot.is_almost_sold_out {
            AvailabilityStatus::AlmostSoldOut
        } else if snapshot.occupancy_percentage >= LIMITED_AVAILABILITY_PERCENTAGE {
            AvailabilityStatus::LimitedAvailability
        } else {
            AvailabilityStatus::Available
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AvailabilityStatus::Loading => "Loading",
            AvailabilityStatus::SoldOut => "Sold Out",
            AvailabilityStatus::AlmostSoldOut => "Almost Sold Out",
            AvailabilityStatus::LimitedAvailability => "Limited Availability",
            AvailabilityStatus::Available => "Available",
        }
    }

    /// Whether booking should be offered in this state
    pub fn is_bookable(&self) -> bool {
        !matches!(self, AvailabilityStatus::Loading | AvailabilityStatus::SoldOut)
    }
}

impl std::fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(capacity: i64, booked: i64) -> AvailabilitySnapshot {
        AvailabilitySnapshot::from_counts(1, capacity, booked, "active", Utc::now())
    }

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(AvailabilityStatus::classify(None), AvailabilityStatus::Loading);
        assert_eq!(AvailabilityStatus::classify(Some(&snapshot(100, 10))), AvailabilityStatus::Available);
        assert_eq!(
            AvailabilityStatus::classify(Some(&snapshot(100, 75))),
            AvailabilityStatus::LimitedAvailability
        );
        assert_eq!(
            AvailabilityStatus::classify(Some(&snapshot(100, 95))),
            AvailabilityStatus::AlmostSoldOut
        );
        assert_eq!(AvailabilityStatus::classify(Some(&snapshot(100, 100))), AvailabilityStatus::SoldOut);
    }

    #[test]
    fn test_sold_out_takes_precedence() {
        let mut full = snapshot(100, 100);
        full.is_almost_sold_out = true;
        assert_eq!(full.occupancy_percentage, 100.0);

        let status = AvailabilityStatus::classify(Some(&full));
        assert_eq!(status, AvailabilityStatus::SoldOut);
        assert_eq!(status.label(), "Sold Out");
        assert!(!status.is_bookable());
    }

    #[test]
    fn test_bookable_states() {
        assert!(!AvailabilityStatus::Loading.is_bookable());
        assert!(AvailabilityStatus::AlmostSoldOut.is_bookable());
        assert!(AvailabilityStatus::LimitedAvailability.is_bookable());
        assert!(AvailabilityStatus::Available.is_bookable());
    }
}
