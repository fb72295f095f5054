use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::client::{ApiError, ProcessApi};
use crate::record::ProcessRecord;

/// Hard floor for the auto-refresh period, guarding against pathological
/// interval input.
pub const MIN_INTERVAL_SECS: u64 = 2;

/// Parses raw interval input. Unparsable, zero, and negative values all
/// clamp to the floor.
pub fn effective_interval_secs(raw: &str) -> u64 {
    raw.trim()
        .parse::<i64>()
        .unwrap_or(0)
        .max(MIN_INTERVAL_SECS as i64) as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Fetch,
    Collect,
    Clear,
}

/// Completion of one backend call, delivered back on the event loop.
#[derive(Debug)]
pub enum Outcome {
    Fetched(Result<Vec<ProcessRecord>, ApiError>),
    Collected(Result<u64, ApiError>),
    Cleared(Result<(), ApiError>),
}

/// Single-flight guard around the collection action: Start only from Idle,
/// Finish always returns to Idle. Calls while in flight are dropped, not
/// queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectState {
    Idle,
    InFlight,
}

#[derive(Debug)]
pub struct CollectGuard {
    state: CollectState,
}

impl CollectGuard {
    pub fn new() -> Self {
        Self {
            state: CollectState::Idle,
        }
    }

    pub fn begin(&mut self) -> bool {
        if self.state == CollectState::InFlight {
            return false;
        }
        self.state = CollectState::InFlight;
        true
    }

    pub fn finish(&mut self) {
        self.state = CollectState::Idle;
    }

    pub fn in_flight(&self) -> bool {
        self.state == CollectState::InFlight
    }
}

impl Default for CollectGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Repeating fetch timer. At most one timer is ever armed; re-arming
/// replaces the previous interval and restarts the countdown.
#[derive(Debug)]
pub struct AutoRefresh {
    interval: Option<Duration>,
    last_fired: Instant,
}

impl AutoRefresh {
    fn new() -> Self {
        Self {
            interval: None,
            last_fired: Instant::now(),
        }
    }

    fn arm(&mut self, secs: u64) {
        self.interval = Some(Duration::from_secs(secs.max(MIN_INTERVAL_SECS)));
        self.last_fired = Instant::now();
    }

    fn disarm(&mut self) {
        self.interval = None;
    }

    pub fn enabled(&self) -> bool {
        self.interval.is_some()
    }

    pub fn interval_secs(&self) -> Option<u64> {
        self.interval.map(|interval| interval.as_secs())
    }

    fn due(&mut self, now: Instant) -> bool {
        match self.interval {
            Some(interval) if now.duration_since(self.last_fired) >= interval => {
                self.last_fired = now;
                true
            }
            _ => false,
        }
    }
}

/// Owns the latest snapshot and the background worker that talks to the
/// backend. Requests go out over a job channel; completions come back over
/// an outcome channel drained once per event-loop turn. Overlapping fetch
/// completions are last-response-wins by construction.
pub struct PollController {
    jobs: Sender<Job>,
    outcomes: Receiver<Outcome>,
    latest_snapshot: Vec<ProcessRecord>,
    auto: AutoRefresh,
    collect: CollectGuard,
}

impl PollController {
    pub fn new<A: ProcessApi + Send + 'static>(api: A) -> Self {
        let (job_tx, job_rx) = mpsc::channel();
        let (outcome_tx, outcome_rx) = mpsc::channel();
        thread::spawn(move || worker(api, job_rx, outcome_tx));
        Self {
            jobs: job_tx,
            outcomes: outcome_rx,
            latest_snapshot: Vec::new(),
            auto: AutoRefresh::new(),
            collect: CollectGuard::new(),
        }
    }

    pub fn latest_snapshot(&self) -> &[ProcessRecord] {
        &self.latest_snapshot
    }

    /// Issues one retrieval. Manual refresh and the auto timer both land
    /// here; there is no coalescing.
    pub fn request_fetch(&self) {
        let _ = self.jobs.send(Job::Fetch);
    }

    /// Starts a collection unless one is already in flight, in which case
    /// the call is silently dropped. Returns whether a request went out.
    pub fn request_collection(&mut self) -> bool {
        if !self.collect.begin() {
            debug!("collection already in flight, dropping request");
            return false;
        }
        let _ = self.jobs.send(Job::Collect);
        true
    }

    pub fn request_clear(&self) {
        let _ = self.jobs.send(Job::Clear);
    }

    pub fn collect_in_flight(&self) -> bool {
        self.collect.in_flight()
    }

    pub fn auto_refresh(&self) -> &AutoRefresh {
        &self.auto
    }

    /// Arms or clears the repeating timer. Any previous timer is replaced
    /// first, so at most one is ever live.
    pub fn set_auto_refresh(&mut self, enabled: bool, interval_secs: u64) {
        self.auto.disarm();
        if enabled {
            self.auto.arm(interval_secs);
        }
    }

    /// Fires a fetch when the armed interval has elapsed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.auto.due(now) {
            self.request_fetch();
            true
        } else {
            false
        }
    }

    /// Drains completions, folds them into controller state, and hands the
    /// events back for presentation. A failed fetch leaves the snapshot
    /// untouched; a finished collection releases the guard on every path
    /// and chases a successful one with an immediate fetch.
    pub fn poll_completions(&mut self) -> Vec<Outcome> {
        let mut events = Vec::new();
        loop {
            match self.outcomes.try_recv() {
                Ok(outcome) => {
                    self.absorb(&outcome);
                    events.push(outcome);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    fn absorb(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Fetched(Ok(rows)) => {
                debug!(rows = rows.len(), "snapshot replaced");
                self.latest_snapshot = rows.clone();
            }
            Outcome::Fetched(Err(err)) => {
                warn!(%err, "fetch failed, keeping previous snapshot");
            }
            Outcome::Collected(result) => {
                self.collect.finish();
                match result {
                    Ok(count) => {
                        debug!(count = *count, "collection finished, refreshing");
                        self.request_fetch();
                    }
                    Err(err) => warn!(%err, "collection failed"),
                }
            }
            Outcome::Cleared(Ok(())) => {
                self.latest_snapshot.clear();
            }
            Outcome::Cleared(Err(err)) => {
                warn!(%err, "clear failed");
            }
        }
    }
}

fn worker<A: ProcessApi>(api: A, jobs: Receiver<Job>, outcomes: Sender<Outcome>) {
    while let Ok(job) = jobs.recv() {
        let outcome = match job {
            Job::Fetch => Outcome::Fetched(api.list_processes()),
            Job::Collect => Outcome::Collected(api.trigger_collection()),
            Job::Clear => Outcome::Cleared(api.clear_all()),
        };
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct MockApi {
        fetches: Arc<AtomicUsize>,
        collects: Arc<AtomicUsize>,
        clears: Arc<AtomicUsize>,
        fail_fetch: bool,
        collect_delay: Duration,
        rows: Vec<ProcessRecord>,
    }

    impl ProcessApi for MockApi {
        fn list_processes(&self) -> Result<Vec<ProcessRecord>, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch {
                Err(ApiError::Status(503))
            } else {
                Ok(self.rows.clone())
            }
        }

        fn trigger_collection(&self) -> Result<u64, ApiError> {
            thread::sleep(self.collect_delay);
            self.collects.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.len() as u64)
        }

        fn clear_all(&self) -> Result<(), ApiError> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn row(pid: i64) -> ProcessRecord {
        ProcessRecord {
            pid,
            parent_pid: None,
            name: Some(format!("proc-{pid}")),
            hostname: Some("host".to_string()),
            cpu_usage: 0.0,
            memory_usage: 0.0,
            timestamp: None,
        }
    }

    fn wait_for_events(controller: &mut PollController, want: usize) -> Vec<Outcome> {
        let deadline = Instant::now() + Duration::from_secs(3);
        let mut events = Vec::new();
        while events.len() < want && Instant::now() < deadline {
            events.extend(controller.poll_completions());
            thread::sleep(Duration::from_millis(5));
        }
        events
    }

    #[test]
    fn interval_floor_holds_for_bad_input() {
        assert_eq!(effective_interval_secs("0"), 2);
        assert_eq!(effective_interval_secs("-5"), 2);
        assert_eq!(effective_interval_secs("abc"), 2);
        assert_eq!(effective_interval_secs(""), 2);
        assert_eq!(effective_interval_secs("10"), 10);
    }

    #[test]
    fn collect_guard_drops_reentrant_start() {
        let mut guard = CollectGuard::new();
        assert!(guard.begin());
        assert!(!guard.begin());
        guard.finish();
        assert!(guard.begin());
        // finish from Idle is harmless
        guard.finish();
        guard.finish();
        assert!(!guard.in_flight());
    }

    #[test]
    fn fetch_replaces_snapshot_on_success() {
        let api = MockApi {
            rows: vec![row(1), row(2)],
            ..MockApi::default()
        };
        let mut controller = PollController::new(api);
        controller.request_fetch();
        let events = wait_for_events(&mut controller, 1);
        assert!(matches!(events[0], Outcome::Fetched(Ok(_))));
        assert_eq!(controller.latest_snapshot().len(), 2);
    }

    #[test]
    fn failed_fetch_keeps_previous_snapshot() {
        let ok_api = MockApi {
            rows: vec![row(1)],
            ..MockApi::default()
        };
        let mut controller = PollController::new(ok_api);
        controller.request_fetch();
        wait_for_events(&mut controller, 1);
        assert_eq!(controller.latest_snapshot().len(), 1);

        // a second controller sharing counters is overkill here; flip the
        // snapshot by pushing a failure through the same worker instead
        let fail_api = MockApi {
            fail_fetch: true,
            ..MockApi::default()
        };
        let mut failing = PollController::new(fail_api);
        failing.latest_snapshot = vec![row(7)];
        failing.request_fetch();
        let events = wait_for_events(&mut failing, 1);
        assert!(matches!(events[0], Outcome::Fetched(Err(_))));
        assert_eq!(failing.latest_snapshot().len(), 1);
        assert_eq!(failing.latest_snapshot()[0].pid, 7);
    }

    #[test]
    fn double_collect_sends_one_request() {
        let api = MockApi {
            collect_delay: Duration::from_millis(150),
            ..MockApi::default()
        };
        let collects = api.collects.clone();
        let mut controller = PollController::new(api);

        assert!(controller.request_collection());
        assert!(!controller.request_collection());
        assert!(controller.collect_in_flight());

        // collected outcome plus the chased fetch
        let events = wait_for_events(&mut controller, 2);
        assert!(events
            .iter()
            .any(|event| matches!(event, Outcome::Collected(Ok(_)))));
        assert_eq!(collects.load(Ordering::SeqCst), 1);
        assert!(!controller.collect_in_flight());

        // guard is released, a new collection may start
        assert!(controller.request_collection());
    }

    #[test]
    fn successful_collection_triggers_immediate_fetch() {
        let api = MockApi {
            rows: vec![row(3)],
            ..MockApi::default()
        };
        let fetches = api.fetches.clone();
        let mut controller = PollController::new(api);
        controller.request_collection();
        let events = wait_for_events(&mut controller, 2);
        assert!(events
            .iter()
            .any(|event| matches!(event, Outcome::Fetched(Ok(_)))));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(controller.latest_snapshot().len(), 1);
    }

    #[test]
    fn clear_empties_snapshot() {
        let api = MockApi {
            rows: vec![row(1)],
            ..MockApi::default()
        };
        let mut controller = PollController::new(api);
        controller.request_fetch();
        wait_for_events(&mut controller, 1);
        assert_eq!(controller.latest_snapshot().len(), 1);

        controller.request_clear();
        let events = wait_for_events(&mut controller, 1);
        assert!(matches!(events[0], Outcome::Cleared(Ok(()))));
        assert!(controller.latest_snapshot().is_empty());
    }

    #[test]
    fn auto_refresh_fires_only_when_due() {
        let mut controller = PollController::new(MockApi::default());
        controller.set_auto_refresh(true, 0);
        let armed = Instant::now();
        assert_eq!(controller.auto_refresh().interval_secs(), Some(2));
        assert!(!controller.tick(armed));
        assert!(controller.tick(armed + Duration::from_secs(3)));

        controller.set_auto_refresh(false, 0);
        assert!(!controller.auto_refresh().enabled());
        assert!(!controller.tick(armed + Duration::from_secs(60)));
    }
}
