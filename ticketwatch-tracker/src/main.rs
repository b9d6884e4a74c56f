use ticketwatch_tracker::availability::{AvailabilityTracker, TrackerOptions, build_source};
use ticketwatch_tracker::config::WatcherConfig;

use anyhow::Result;
use std::sync::Arc;
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = WatcherConfig::from_file(&config_path)?;

    // Initialize logging
    let _logging_guard = ticketwatch_tracker::logging::init_logging(&config.log_dir, "ticketwatch", &config.log_level)?;

    tracing::info!("ticketwatch starting with {}", config_path);
    tracing::info!(
        "Source mode: {}, poll interval: {}s",
        config.mode,
        config.poll_interval_secs
    );

    if config.event_ids.is_empty() {
        tracing::warn!("No event_ids configured, nothing to watch");
        return Ok(());
    }

    let source = build_source(&config)?;
    let tracker = Arc::new(AvailabilityTracker::new(source, TrackerOptions::from(&config)));

    // One watcher task per event, logging status transitions
    let mut watchers = Vec::with_capacity(config.event_ids.len());
    for &event_id in &config.event_ids {
        let tracker = tracker.clone();
        watchers.push(tokio::spawn(async move {
            let mut statuses = tracker.watch_status(event_id);
            while let Some(status) = statuses.next().await {
                match tracker.availability(event_id) {
                    Some(snapshot) => tracing::info!(
                        "Event {}: {} ({} of {} tickets left, {:.1}% booked)",
                        event_id,
                        status,
                        snapshot.available_tickets,
                        snapshot.total_capacity,
                        snapshot.occupancy_percentage
                    ),
                    None => tracing::info!("Event {}: {}", event_id, status),
                }
            }
        }));
    }

    tracker.track(config.event_ids.iter().copied());
    tracing::info!("Tracking {} events", config.event_ids.len());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    for watcher in watchers {
        watcher.abort();
    }
    tracker.shutdown();

    let stats = tracker.stats();
    tracing::info!(
        "Completed {} polling cycles ({} failed)",
        stats.cycles,
        stats.failed_cycles
    );

    Ok(())
}
