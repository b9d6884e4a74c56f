use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use ticketwatch_common::EventId;

use super::snapshot::{AvailabilitySnapshot, SnapshotMap};
use super::source::AvailabilitySource;
use super::status::AvailabilityStatus;
use crate::config::WatcherConfig;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Polling cadence of a tracker
#[derive(Debug, Clone)]
pub struct TrackerOptions {
    pub poll_interval: Duration,
    /// Used instead of `poll_interval` while at least half of the events with
    /// data are almost or fully sold out
    pub hot_poll_interval: Option<Duration>,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            hot_poll_interval: None,
        }
    }
}

impl From<&WatcherConfig> for TrackerOptions {
    fn from(config: &WatcherConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            hot_poll_interval: config.hot_poll_interval(),
        }
    }
}

/// Counters describing the polling history
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    /// Responses dropped because a newer cycle had already been applied
    pub stale_cycles: u64,
    pub last_success: Option<DateTime<Utc>>,
}

/// Outcome of applying one fetch result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CycleReport {
    updated: usize,
    unchanged: usize,
    untracked: usize,
}

/// Running polling loop with its own wakeup signal
struct PollTask {
    handle: JoinHandle<()>,
    wakeup: Arc<Notify>,
}

struct TrackerState {
    tracked: BTreeSet<EventId>,
    poll_task: Option<PollTask>,
    /// Sequence number handed to the next fetch cycle
    next_cycle: u64,
    /// Sequence number of the newest cycle whose result was applied
    applied_cycle: u64,
    stats: TrackerStats,
}

struct Shared {
    source: Arc<dyn AvailabilitySource>,
    options: TrackerOptions,
    state: Mutex<TrackerState>,
    snapshots: watch::Sender<SnapshotMap>,
    polling: watch::Sender<bool>,
}

/// Keeps remaining-ticket counts of a set of events up to date by polling an
/// [`AvailabilitySource`].
///
/// Fetch failures never reach subscribers: the last known snapshots stay
/// published until a later cycle succeeds. The polling task is started on the
/// first [`track`](Self::track) call, so that call must happen inside a Tokio
/// runtime. Dropping the tracker stops polling.
pub struct AvailabilityTracker {
    shared: Arc<Shared>,
}

impl AvailabilityTracker {
    pub fn new(source: Arc<dyn AvailabilitySource>, options: TrackerOptions) -> Self {
        let (snapshots, _) = watch::channel(SnapshotMap::default());
        let (polling, _) = watch::channel(false);

        Self {
            shared: Arc::new(Shared {
                source,
                options,
                state: Mutex::new(TrackerState {
                    tracked: BTreeSet::new(),
                    poll_task: None,
                    next_cycle: 1,
                    applied_cycle: 0,
                    stats: TrackerStats::default(),
                }),
                snapshots,
                polling,
            }),
        }
    }

    /// Add events to the tracked set and fetch their availability right away.
    ///
    /// Tracking is additive: ids already tracked stay tracked.
    pub fn track(&self, event_ids: impl IntoIterator<Item = EventId>) {
        let mut state = self.shared.lock_state();
        let before = state.tracked.len();
        state.tracked.extend(event_ids);

        if state.tracked.is_empty() {
            return;
        }
        if state.tracked.len() > before {
            debug!("Tracking {} events", state.tracked.len());
        }

        let running = state
            .poll_task
            .as_ref()
            .filter(|task| !task.handle.is_finished())
            .map(|task| task.wakeup.clone());

        if let Some(wakeup) = running {
            wakeup.notify_one();
        } else {
            // The first cycle of a new loop runs immediately
            let wakeup = Arc::new(Notify::new());
            let handle = tokio::spawn(poll_loop(self.shared.clone(), wakeup.clone()));
            state.poll_task = Some(PollTask { handle, wakeup });
            self.shared.polling.send_replace(true);
        }
    }

    /// Stop tracking one event and forget its snapshot. Polling stops with the last event.
    pub fn stop_tracking(&self, event_id: EventId) {
        let mut state = self.shared.lock_state();
        if !state.tracked.remove(&event_id) {
            return;
        }

        self.shared.snapshots.send_if_modified(|map| {
            if !map.contains_key(&event_id) {
                return false;
            }
            let mut next = (**map).clone();
            next.remove(&event_id);
            *map = Arc::new(next);
            true
        });

        if state.tracked.is_empty() {
            self.shared.stop_polling(&mut state);
        }
    }

    /// Fetch all tracked events now instead of waiting for the next tick
    pub fn refresh(&self) {
        let state = self.shared.lock_state();
        if state.tracked.is_empty() {
            return;
        }
        if let Some(task) = &state.poll_task {
            task.wakeup.notify_one();
        }
    }

    /// Stream of the event's snapshot, `None` while there is no data.
    ///
    /// Yields the current value first, then one item per change; equal
    /// consecutive values are suppressed.
    pub fn watch_availability(&self, event_id: EventId) -> BoxStream<'static, Option<AvailabilitySnapshot>> {
        let mut last: Option<Option<AvailabilitySnapshot>> = None;
        let stream = WatchStream::new(self.shared.snapshots.subscribe()).filter_map(move |map| {
            let current = map.get(&event_id).cloned();
            if last.as_ref() == Some(&current) {
                return None;
            }
            last = Some(current.clone());
            Some(current)
        });
        Box::pin(stream)
    }

    /// Stream of the event's display status, deduplicated like [`watch_availability`](Self::watch_availability)
    pub fn watch_status(&self, event_id: EventId) -> BoxStream<'static, AvailabilityStatus> {
        let mut last = None;
        let stream = WatchStream::new(self.shared.snapshots.subscribe()).filter_map(move |map| {
            let status = AvailabilityStatus::classify(map.get(&event_id));
            if last == Some(status) {
                return None;
            }
            last = Some(status);
            Some(status)
        });
        Box::pin(stream)
    }

    /// Receiver of every published snapshot map
    pub fn subscribe(&self) -> watch::Receiver<SnapshotMap> {
        self.shared.snapshots.subscribe()
    }

    /// Receiver of the polling-active flag
    pub fn polling(&self) -> watch::Receiver<bool> {
        self.shared.polling.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        *self.shared.polling.borrow()
    }

    pub fn availability(&self, event_id: EventId) -> Option<AvailabilitySnapshot> {
        self.shared.snapshots.borrow().get(&event_id).cloned()
    }

    pub fn snapshot_map(&self) -> SnapshotMap {
        self.shared.snapshots.borrow().clone()
    }

    pub fn is_sold_out(&self, event_id: EventId) -> bool {
        self.shared
            .snapshots
            .borrow()
            .get(&event_id)
            .is_some_and(|s| s.is_sold_out)
    }

    pub fn is_almost_sold_out(&self, event_id: EventId) -> bool {
        self.shared
            .snapshots
            .borrow()
            .get(&event_id)
            .is_some_and(|s| s.is_almost_sold_out)
    }

    pub fn availability_status(&self, event_id: EventId) -> AvailabilityStatus {
        AvailabilityStatus::classify(self.shared.snapshots.borrow().get(&event_id))
    }

    pub fn tracked_events(&self) -> Vec<EventId> {
        self.shared.lock_state().tracked.iter().copied().collect()
    }

    pub fn stats(&self) -> TrackerStats {
        self.shared.lock_state().stats.clone()
    }

    /// Stop polling and forget every tracked event and snapshot
    pub fn shutdown(&self) {
        let mut state = self.shared.lock_state();
        state.tracked.clear();
        self.shared.stop_polling(&mut state);
        self.shared.snapshots.send_if_modified(|map| {
            if map.is_empty() {
                return false;
            }
            *map = SnapshotMap::default();
            true
        });
        info!("Availability tracker shut down");
    }
}

impl Drop for AvailabilityTracker {
    fn drop(&mut self) {
        let mut state = self.shared.lock_state();
        state.tracked.clear();
        self.shared.stop_polling(&mut state);
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn stop_polling(&self, state: &mut TrackerState) {
        // Dropping the task's Notify discards any wakeup it had not consumed
        if let Some(task) = state.poll_task.take() {
            task.handle.abort();
            info!("Availability polling stopped");
        }
        self.polling.send_replace(false);
    }

    /// Fetch every tracked event once and publish the result
    async fn run_cycle(&self) {
        let (cycle, event_ids) = {
            let mut state = self.lock_state();
            if state.tracked.is_empty() {
                return;
            }
            let cycle = state.next_cycle;
            state.next_cycle += 1;
            (cycle, state.tracked.iter().copied().collect::<Vec<_>>())
        };

        match self.source.fetch(&event_ids).await {
            Ok(fetched) => {
                let returned = fetched.len();
                if let Some(report) = self.apply(cycle, fetched) {
                    debug!(
                        "Availability cycle {}: {}/{} events returned, {} updated, {} unchanged, {} no longer tracked",
                        cycle,
                        returned,
                        event_ids.len(),
                        report.updated,
                        report.unchanged,
                        report.untracked
                    );
                }
            }
            Err(e) => {
                let mut state = self.lock_state();
                state.stats.cycles += 1;
                state.stats.failed_cycles += 1;
                warn!(
                    "Availability fetch from {} source failed, keeping previous data: {}",
                    self.source.name(),
                    e
                );
            }
        }
    }

    /// Overwrite snapshots by key with the result of `cycle`.
    ///
    /// Ids missing from `fetched` keep their previous snapshot. Results for ids
    /// that are no longer tracked, and results of cycles older than the last
    /// applied one, are dropped.
    fn apply(&self, cycle: u64, fetched: HashMap<EventId, AvailabilitySnapshot>) -> Option<CycleReport> {
        let mut state = self.lock_state();
        state.stats.cycles += 1;

        if cycle <= state.applied_cycle {
            state.stats.stale_cycles += 1;
            debug!(
                "Dropping result of availability cycle {}, cycle {} already applied",
                cycle, state.applied_cycle
            );
            return None;
        }
        state.applied_cycle = cycle;
        state.stats.last_success = Some(Utc::now());

        let mut report = CycleReport {
            updated: 0,
            unchanged: 0,
            untracked: 0,
        };
        let tracked = &state.tracked;

        self.snapshots.send_if_modified(|map| {
            let mut next: Option<HashMap<EventId, AvailabilitySnapshot>> = None;

            for (event_id, snapshot) in fetched {
                if !tracked.contains(&event_id) {
                    report.untracked += 1;
                    continue;
                }
                if map.get(&event_id) == Some(&snapshot) {
                    report.unchanged += 1;
                    continue;
                }
                next.get_or_insert_with(|| (**map).clone()).insert(event_id, snapshot);
                report.updated += 1;
            }

            match next {
                Some(next) => {
                    *map = Arc::new(next);
                    true
                }
                None => false,
            }
        });

        Some(report)
    }

    /// Delay until the next scheduled cycle
    fn next_delay(&self) -> Duration {
        let Some(hot_interval) = self.options.hot_poll_interval else {
            return self.options.poll_interval;
        };

        let map = self.snapshots.borrow();
        let hot = map
            .values()
            .filter(|s| s.is_sold_out || s.is_almost_sold_out)
            .count();

        if !map.is_empty() && hot * 2 >= map.len() {
            hot_interval
        } else {
            self.options.poll_interval
        }
    }
}

/// Single-flight polling loop: cycles never overlap, and wakeups requested
/// while a fetch is running start the next cycle as soon as it ends.
async fn poll_loop(shared: Arc<Shared>, wakeup: Arc<Notify>) {
    info!(
        "Availability polling started (interval: {:?}, source: {})",
        shared.options.poll_interval,
        shared.source.name()
    );

    loop {
        shared.run_cycle().await;

        let delay = shared.next_delay();
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = wakeup.notified() => {
                debug!("Immediate availability refresh requested");
            }
        }
    }
}
