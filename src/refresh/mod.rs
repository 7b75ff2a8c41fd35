//! Refresh Controller
//!
//! Owns the queue snapshot and keeps it current. Every fetch takes a generation number
//! from a shared counter; a result is applied only while its generation is still the
//! latest, so a slow response can never overwrite a newer one. Transient failures are
//! retried with linearly growing delays. A failed fetch leaves the previous snapshot in
//! place and records the error for display.

mod snapshot;

pub use snapshot::{Snapshot, SnapshotDiff};

use crate::canonical::canonicalize;
use crate::error::{ErrorKind, QueueError};
use crate::record::CanonicalRecord;
use crate::store::{FetchTicket, ListQuery, QueueStore};
use crate::types::QueueKind;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Refresh timing and retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between periodic refreshes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Retries after the first failed attempt; only transient failures are retried
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Delay before retry N is N times this value
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Trigger a manual refresh after every successful dispatch
    #[serde(default = "default_true")]
    pub refresh_after_dispatch: bool,
}

fn default_interval_secs() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            refresh_after_dispatch: default_true(),
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Delay before the given 1-based retry
    pub fn delay_for(&self, retry: usize) -> Duration {
        self.base_delay()
            .saturating_mul(u32::try_from(retry).unwrap_or(u32::MAX))
    }
}

/// What asked for a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
    /// Polling timer; dropped while another fetch is in flight
    Periodic,
    /// Explicit request or post-dispatch; always starts and supersedes older fetches
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    Idle,
    Fetching,
    Backoff,
}

/// Published refresh state, read by the view layer
#[derive(Debug, Clone)]
pub struct RefreshState {
    pub snapshot: Arc<Snapshot>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub error: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub phase: RefreshPhase,
    pub retry_attempts: usize,
}

impl RefreshState {
    pub fn is_refreshing(&self) -> bool {
        self.phase != RefreshPhase::Idle
    }
}

impl Default for RefreshState {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(Snapshot::default()),
            last_refreshed_at: None,
            error: None,
            error_message: None,
            phase: RefreshPhase::Idle,
            retry_attempts: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// A new snapshot was published
    Refreshed { diff: SnapshotDiff, retries: usize },
    /// Periodic trigger ignored because a fetch was already running
    Skipped,
    /// A newer fetch started before this one finished; its result was discarded
    Superseded,
    /// Attempts exhausted or a non-retryable failure; the old snapshot stays
    Failed { kind: ErrorKind, retries: usize },
}

/// Handle for undoing an optimistic merge
#[derive(Debug, Clone)]
pub struct ProvisionalMerge {
    previous: Arc<Snapshot>,
    version: u64,
}

impl ProvisionalMerge {
    pub fn version(&self) -> u64 {
        self.version
    }
}

pub struct RefreshController<S: QueueStore + ?Sized> {
    kind: QueueKind,
    store: Arc<S>,
    config: RefreshConfig,
    query: RwLock<ListQuery>,
    generation: Arc<AtomicU64>,
    refreshing: AtomicBool,
    versions: AtomicU64,
    state: RwLock<RefreshState>,
}

impl<S: QueueStore + ?Sized> RefreshController<S> {
    pub fn new(kind: QueueKind, store: Arc<S>, config: RefreshConfig) -> Self {
        Self {
            kind,
            store,
            config,
            query: RwLock::new(ListQuery::default()),
            generation: Arc::new(AtomicU64::new(0)),
            refreshing: AtomicBool::new(false),
            versions: AtomicU64::new(0),
            state: RwLock::new(RefreshState::default()),
        }
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Server-side filter applied to subsequent fetches
    pub fn set_query(&self, query: ListQuery) {
        *self.query.write() = query;
    }

    pub fn state(&self) -> RefreshState {
        self.state.read().clone()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.state.read().snapshot)
    }

    pub fn find(&self, id: &str) -> Option<CanonicalRecord> {
        self.state.read().snapshot.get(id).cloned()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Latest generation handed out
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn next_version(&self) -> u64 {
        self.versions.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Fetch the queue and publish the result if nothing newer started meanwhile
    pub async fn refresh(&self, trigger: RefreshTrigger) -> RefreshOutcome {
        if trigger == RefreshTrigger::Periodic
            && self
                .refreshing
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            debug!(kind = %self.kind, "Periodic refresh skipped; fetch already in flight");
            return RefreshOutcome::Skipped;
        }

        let flight = InFlight {
            controller: self,
            ticket: {
            let mut state = self.state.write();
            let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            self.refreshing.store(true, Ordering::Release);
            state.phase = RefreshPhase::Fetching;
            state.retry_attempts = 0;
            FetchTicket::new(generation, Arc::clone(&self.generation))
            },
        };
        let ticket = &flight.ticket;
        let query = self.query.read().clone();
        let mut retries = 0;

        loop {
            debug!(
                kind = %self.kind,
                generation = ticket.generation(),
                attempt = retries + 1,
                ?trigger,
                store = self.store.store_name(),
                "Fetching queue"
            );
            let result = self.store.list(self.kind, &query, ticket).await;
            if ticket.is_cancelled() {
                debug!(
                    kind = %self.kind,
                    generation = ticket.generation(),
                    "Discarding superseded fetch result"
                );
                return RefreshOutcome::Superseded;
            }

            let err = match result {
                Ok(raws) => {
                    let records = raws.iter().map(|raw| canonicalize(self.kind, raw)).collect();
                    return self.publish(ticket, records, retries);
                }
                Err(err) => QueueError::from(err),
            };

            if err.is_retryable() && retries < self.config.max_retries {
                retries += 1;
                let delay = self.config.delay_for(retries);
                warn!(
                    kind = %self.kind,
                    generation = ticket.generation(),
                    retry = retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient refresh failure, retrying"
                );
                if !self.set_phase(ticket, RefreshPhase::Backoff, retries) {
                    return RefreshOutcome::Superseded;
                }
                sleep(delay).await;
                if !self.set_phase(ticket, RefreshPhase::Fetching, retries) {
                    debug!(kind = %self.kind, generation = ticket.generation(), "Fetch superseded during backoff");
                    return RefreshOutcome::Superseded;
                }
                continue;
            }

            return self.fail(ticket, err, retries);
        }
    }

    fn set_phase(&self, ticket: &FetchTicket, phase: RefreshPhase, retries: usize) -> bool {
        let mut state = self.state.write();
        if ticket.is_cancelled() {
            return false;
        }
        state.phase = phase;
        state.retry_attempts = retries;
        true
    }

    fn publish(
        &self,
        ticket: &FetchTicket,
        records: Vec<CanonicalRecord>,
        retries: usize,
    ) -> RefreshOutcome {
        let mut state = self.state.write();
        // Generation bumps happen under this lock, so the check cannot race a newer fetch.
        if ticket.is_cancelled() {
            return RefreshOutcome::Superseded;
        }
        let next = Snapshot::new(self.next_version(), records);
        let diff = state.snapshot.diff(&next);
        let count = next.len();
        let version = next.version();
        state.snapshot = Arc::new(next);
        state.last_refreshed_at = Some(Utc::now());
        state.error = None;
        state.error_message = None;
        state.phase = RefreshPhase::Idle;
        state.retry_attempts = retries;
        self.refreshing.store(false, Ordering::Release);
        drop(state);

        if diff.is_empty() {
            debug!(kind = %self.kind, generation = ticket.generation(), version, count, "Queue unchanged");
        } else {
            info!(
                kind = %self.kind,
                generation = ticket.generation(),
                version,
                count,
                added = diff.added.len(),
                removed = diff.removed.len(),
                changed = diff.changed.len(),
                retries,
                "Queue refreshed"
            );
        }
        RefreshOutcome::Refreshed { diff, retries }
    }

    fn fail(&self, ticket: &FetchTicket, err: QueueError, retries: usize) -> RefreshOutcome {
        let mut state = self.state.write();
        if ticket.is_cancelled() {
            return RefreshOutcome::Superseded;
        }
        state.error = Some(err.kind());
        state.error_message = Some(err.to_string());
        state.phase = RefreshPhase::Idle;
        state.retry_attempts = retries;
        self.refreshing.store(false, Ordering::Release);
        drop(state);

        error!(
            kind = %self.kind,
            generation = ticket.generation(),
            retries,
            error = %err,
            "Queue refresh failed; keeping previous snapshot"
        );
        RefreshOutcome::Failed {
            kind: err.kind(),
            retries,
        }
    }

    /// Publish `record` immediately, ahead of the store confirming it
    pub fn merge_provisional(&self, record: CanonicalRecord) -> ProvisionalMerge {
        let mut state = self.state.write();
        let previous = Arc::clone(&state.snapshot);
        let next = previous.with_record(self.next_version(), record);
        let version = next.version();
        state.snapshot = Arc::new(next);
        ProvisionalMerge { previous, version }
    }

    /// Undo a provisional merge; returns false when a newer snapshot already replaced it
    pub fn rollback(&self, merge: ProvisionalMerge) -> bool {
        let mut state = self.state.write();
        if state.snapshot.version() != merge.version {
            debug!(
                kind = %self.kind,
                provisional = merge.version,
                current = state.snapshot.version(),
                "Rollback skipped; newer snapshot published"
            );
            return false;
        }
        state.snapshot = merge.previous;
        true
    }
}

impl<S: QueueStore + ?Sized + 'static> RefreshController<S> {
    /// Start the polling timer; the first tick fires immediately
    pub fn spawn_polling(self: &Arc<Self>) -> PollingHandle {
        let controller = Arc::clone(self);
        let period = self.config.interval().max(Duration::from_millis(1));
        info!(kind = %self.kind, interval_secs = self.config.interval_secs, "Starting queue polling");
        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                // Awaited in place so stopping the poller also drops the fetch in flight
                controller.refresh(RefreshTrigger::Periodic).await;
            }
        });
        PollingHandle { task: Some(task) }
    }
}

/// Marks a fetch as in flight; dropping it before `publish` or `fail` ran clears the marker
struct InFlight<'a, S: QueueStore + ?Sized> {
    controller: &'a RefreshController<S>,
    ticket: FetchTicket,
}

impl<S: QueueStore + ?Sized> Drop for InFlight<'_, S> {
    fn drop(&mut self) {
        let controller = self.controller;
        let mut state = controller.state.write();
        if self.ticket.is_cancelled() || state.phase == RefreshPhase::Idle {
            return;
        }
        state.phase = RefreshPhase::Idle;
        controller.refreshing.store(false, Ordering::Release);
        drop(state);
        debug!(
            kind = %controller.kind,
            generation = self.ticket.generation(),
            "Fetch dropped before completion"
        );
    }
}

/// Stops the polling task when stopped or dropped
pub struct PollingHandle {
    task: Option<JoinHandle<()>>,
}

impl PollingHandle {
    pub fn stop(mut self) {
        self.abort();
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.abort();
    }
}
