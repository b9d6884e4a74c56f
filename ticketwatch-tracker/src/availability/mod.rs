//! Real-time ticket availability tracking.
//!
//! An [`AvailabilityTracker`] polls an [`AvailabilitySource`] for the events
//! it has been asked to track and republishes the merged snapshots to any
//! number of subscribers.

pub mod http;
pub mod mock;
pub mod snapshot;
pub mod source;
pub mod status;
pub mod tracker;

pub use http::HttpAvailabilitySource;
pub use mock::MockAvailabilitySource;
pub use snapshot::{AvailabilitySnapshot, SnapshotMap};
pub use source::{AvailabilitySource, FetchError, SourceMode, build_source};
pub use status::AvailabilityStatus;
pub use tracker::{AvailabilityTracker, TrackerOptions, TrackerStats};
