pub mod availability;
pub mod config;
pub mod logging;

pub use ticketwatch_common::EventId;
