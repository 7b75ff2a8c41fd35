//! Queue engine
//!
//! Wires one queue's refresh controller, access policy, review state machine and
//! collaborator store together. Reads go through the access policy and view model;
//! writes run the local state machine, merge the result optimistically, then send it
//! to the store. A rejected write rolls the merge back and is never retried.

use crate::access::{visible_in_queue, ReviewerIdentity};
use crate::canonical::canonicalize;
use crate::error::{QueueError, StoreError};
use crate::record::CanonicalRecord;
use crate::refresh::{
    PollingHandle, RefreshConfig, RefreshController, RefreshOutcome, RefreshState, RefreshTrigger,
};
use crate::review::{ReviewAction, ReviewMachine, SideEffect};
use crate::store::{QueueStore, TransitionRequest};
use crate::types::QueueKind;
use crate::view::{self, QueueFilters};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of a dispatched reviewer action
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Record as confirmed by the store
    pub record: CanonicalRecord,
    /// Side effects that were executed
    pub side_effects: Vec<SideEffect>,
    /// Follow-up refresh, when enabled
    pub refresh: Option<RefreshOutcome>,
}

pub struct QueueEngine<S: QueueStore + ?Sized = dyn QueueStore> {
    kind: QueueKind,
    store: Arc<S>,
    controller: Arc<RefreshController<S>>,
    machine: ReviewMachine,
}

impl<S: QueueStore + ?Sized> QueueEngine<S> {
    pub fn new(kind: QueueKind, store: Arc<S>, config: RefreshConfig) -> Self {
        let controller = Arc::new(RefreshController::new(kind, Arc::clone(&store), config));
        Self {
            kind,
            store,
            controller,
            machine: ReviewMachine::default(),
        }
    }

    /// Use custom transition tables
    pub fn with_machine(mut self, machine: ReviewMachine) -> Self {
        self.machine = machine;
        self
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn controller(&self) -> &Arc<RefreshController<S>> {
        &self.controller
    }

    pub fn machine(&self) -> &ReviewMachine {
        &self.machine
    }

    /// Snapshot, last refresh time, error indicator and refreshing flag
    pub fn output(&self) -> RefreshState {
        self.controller.state()
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        self.controller.refresh(RefreshTrigger::Manual).await
    }

    /// Records the reviewer may see, filtered and ordered.
    ///
    /// A reviewer without access to the queue gets an empty list.
    pub fn visible(&self, reviewer: &ReviewerIdentity, filters: &QueueFilters) -> Vec<CanonicalRecord> {
        let snapshot = self.controller.snapshot();
        let records = visible_in_queue(reviewer, self.kind, snapshot.records());
        view::visible(records, filters)
            .into_iter()
            .cloned()
            .collect()
    }

    /// One record, from the snapshot or fetched from the store if absent
    pub async fn record(
        &self,
        reviewer: &ReviewerIdentity,
        id: &str,
    ) -> Result<CanonicalRecord, QueueError> {
        reviewer.verify_access(self.kind)?;
        if let Some(record) = self.controller.find(id) {
            return Ok(record);
        }
        debug!(kind = %self.kind, id, "Record not in snapshot; fetching from store");
        let raw = self.store.get(self.kind, id).await?;
        Ok(canonicalize(self.kind, &raw))
    }

    /// Apply a reviewer action locally, then persist it through the store
    pub async fn dispatch(
        &self,
        reviewer: &ReviewerIdentity,
        id: &str,
        action: ReviewAction,
    ) -> Result<DispatchOutcome, QueueError> {
        let current = self.record(reviewer, id).await?;
        let at = Utc::now();
        let output = self.machine.apply(&current, &action, reviewer, at)?;

        let merge = self.controller.merge_provisional(output.next.clone());
        let sent = match &action {
            ReviewAction::AppendAnswer { .. } => match output.next.notes.last() {
                Some(note) => self.store.append_note(self.kind, id, note).await,
                None => Err(StoreError::Decode("answer produced no note".to_string())),
            },
            ReviewAction::Transition { .. } | ReviewAction::Review { .. } => {
                let request = TransitionRequest {
                    action: action.clone(),
                    reviewer: reviewer.clone(),
                    at,
                };
                self.store.transition(self.kind, id, &request).await
            }
        };

        let raw = match sent {
            Ok(raw) => raw,
            Err(err) => {
                let rolled_back = self.controller.rollback(merge);
                warn!(
                    kind = %self.kind,
                    id,
                    action = action.label(),
                    rolled_back,
                    error = %err,
                    "Store rejected action; optimistic update reverted"
                );
                return Err(err.into());
            }
        };

        let confirmed = canonicalize(self.kind, &raw);
        let record = if confirmed.id.is_empty() {
            output.next
        } else {
            confirmed
        };
        self.controller.merge_provisional(record.clone());
        info!(
            kind = %self.kind,
            id,
            action = action.label(),
            reviewer = %reviewer.id,
            status = %record.status,
            "Action dispatched"
        );

        for effect in &output.side_effects {
            self.execute(effect).await?;
        }

        let refresh = if self.controller.config().refresh_after_dispatch {
            Some(self.controller.refresh(RefreshTrigger::Manual).await)
        } else {
            None
        };

        Ok(DispatchOutcome {
            record,
            side_effects: output.side_effects,
            refresh,
        })
    }

    /// Perform one side effect; a failure surfaces as-is, never retried
    async fn execute(&self, effect: &SideEffect) -> Result<(), QueueError> {
        match effect {
            SideEffect::DeleteSubject { subject_id, .. } => {
                if let Err(err) = self.store.remove(subject_id).await {
                    error!(effect = %effect.describe(), error = %err, "Side effect failed");
                    let message = format!("{} failed after the decision was recorded: {err}", effect.describe());
                    return Err(if err.is_transient() {
                        QueueError::TransientNetwork(message)
                    } else {
                        QueueError::TerminalNetwork(message)
                    });
                }
                info!(effect = %effect.describe(), "Side effect executed");
                Ok(())
            }
        }
    }
}

impl<S: QueueStore + ?Sized + 'static> QueueEngine<S> {
    /// Start periodic refreshes for this queue
    pub fn start_polling(&self) -> PollingHandle {
        self.controller.spawn_polling()
    }
}
