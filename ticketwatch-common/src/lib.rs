pub mod types;

pub use types::{
    occupancy_percentage, ApiResponse, AvailabilityRecord, EventId, EventStatus,
    MultipleAvailability,
};
