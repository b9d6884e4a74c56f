//! Availability API serving ticket counts from an in-memory catalog

pub mod catalog;
pub mod config;
pub mod routes;

pub use catalog::{BookingError, Catalog, CatalogEvent};
pub use config::Config;
pub use routes::{build_router, serve};
