//! Review State Machine
//!
//! Validates reviewer actions against a canonical record and produces the next record
//! plus the side effects the engine must perform. `apply` is synchronous and pure: the
//! caller supplies the action instant, and effects are returned as data.

pub mod effect;
pub mod table;

use crate::access::ReviewerIdentity;
use crate::error::QueueError;
use crate::record::{AuditNote, CanonicalRecord, RecordStatus};
use crate::types::QueueKind;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub use effect::{EffectKind, SideEffect};
pub use table::TransitionTable;

/// Reviewer action against a single record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReviewAction {
    /// Move the record to another status of its queue
    Transition { to: RecordStatus },
    /// Append a reviewer answer to the audit trail without changing status
    AppendAnswer { text: String },
    /// Decide a record awaiting review; first decision wins
    Review {
        outcome: RecordStatus,
        note: Option<String>,
    },
}

impl ReviewAction {
    pub fn label(&self) -> &'static str {
        match self {
            ReviewAction::Transition { .. } => "transition",
            ReviewAction::AppendAnswer { .. } => "append_answer",
            ReviewAction::Review { .. } => "review",
        }
    }
}

/// Accepted transition
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutput {
    pub next: CanonicalRecord,
    pub side_effects: Vec<SideEffect>,
}

/// Transition tables for every queue
#[derive(Debug, Clone)]
pub struct ReviewMachine {
    support: TransitionTable,
    account_deletion: TransitionTable,
}

impl Default for ReviewMachine {
    fn default() -> Self {
        Self {
            support: TransitionTable::support(),
            account_deletion: TransitionTable::account_deletion(),
        }
    }
}

impl ReviewMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the table of the queue `table` belongs to
    pub fn with_table(mut self, table: TransitionTable) -> Self {
        match table.kind() {
            QueueKind::Support => self.support = table,
            QueueKind::AccountDeletion => self.account_deletion = table,
        }
        self
    }

    pub fn table(&self, kind: QueueKind) -> &TransitionTable {
        match kind {
            QueueKind::Support => &self.support,
            QueueKind::AccountDeletion => &self.account_deletion,
        }
    }

    pub fn apply(
        &self,
        record: &CanonicalRecord,
        action: &ReviewAction,
        reviewer: &ReviewerIdentity,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutput, QueueError> {
        apply(self.table(record.kind), record, action, reviewer, at)
    }
}

/// Validate and apply `action` to `record` under `table`.
///
/// Authorization is checked before the table is consulted.
pub fn apply(
    table: &TransitionTable,
    record: &CanonicalRecord,
    action: &ReviewAction,
    reviewer: &ReviewerIdentity,
    at: DateTime<Utc>,
) -> Result<TransitionOutput, QueueError> {
    reviewer.verify_access(record.kind)?;

    if table.kind() != record.kind {
        return Err(QueueError::Validation(format!(
            "{} table cannot apply to {} record {}",
            table.kind(),
            record.kind,
            record.id
        )));
    }

    match action {
        ReviewAction::AppendAnswer { text } => append_answer(table, record, text, reviewer, at),
        ReviewAction::Transition { to } => transition(table, record, *to, reviewer, at),
        ReviewAction::Review { outcome, note } => {
            review(table, record, *outcome, note.as_deref(), reviewer, at)
        }
    }
}

fn append_answer(
    table: &TransitionTable,
    record: &CanonicalRecord,
    text: &str,
    reviewer: &ReviewerIdentity,
    at: DateTime<Utc>,
) -> Result<TransitionOutput, QueueError> {
    if !table.accepts_answers() {
        return Err(QueueError::Validation(format!(
            "{} records do not accept answers",
            record.kind
        )));
    }
    let text = text.trim();
    if text.is_empty() {
        return Err(QueueError::Validation("answer text must not be empty".to_string()));
    }

    let mut next = record.clone();
    next.notes.push(note(text, reviewer, at));
    next.updated_at = Some(at);
    Ok(TransitionOutput {
        next,
        side_effects: Vec::new(),
    })
}

fn transition(
    table: &TransitionTable,
    record: &CanonicalRecord,
    to: RecordStatus,
    reviewer: &ReviewerIdentity,
    at: DateTime<Utc>,
) -> Result<TransitionOutput, QueueError> {
    if to.kind() != record.kind {
        return Err(QueueError::Validation(format!(
            "status {to} does not belong to the {} queue",
            record.kind
        )));
    }
    if table.is_review_outcome(to) {
        return Err(QueueError::Validation(format!(
            "status {to} can only be reached with a review decision"
        )));
    }
    check_not_terminal(table, record)?;
    if to == record.status {
        return Err(QueueError::Validation(format!(
            "record {} is already {to}",
            record.id
        )));
    }
    if !table.permits(record.status, to) {
        return Err(QueueError::Validation(format!(
            "transition {} -> {to} is not permitted",
            record.status
        )));
    }

    let mut next = record.clone();
    next.status = to;
    next.updated_at = Some(at);
    if record.status == table.initial() && next.reviewed_by.is_none() {
        next.reviewed_by = Some(reviewer.id.clone());
        next.reviewed_at = Some(at);
    }
    let side_effects = effects_for(table, &next)?;
    Ok(TransitionOutput { next, side_effects })
}

fn review(
    table: &TransitionTable,
    record: &CanonicalRecord,
    outcome: RecordStatus,
    review_note: Option<&str>,
    reviewer: &ReviewerIdentity,
    at: DateTime<Utc>,
) -> Result<TransitionOutput, QueueError> {
    if !table.has_review_action() {
        return Err(QueueError::Validation(format!(
            "{} records are not decided by review",
            record.kind
        )));
    }
    if !table.is_review_outcome(outcome) {
        return Err(QueueError::Validation(format!(
            "{outcome} is not a review outcome for {} records",
            record.kind
        )));
    }
    if record.status != table.initial() || record.is_reviewed() {
        return Err(QueueError::Conflict(format!(
            "record {} was already reviewed ({})",
            record.id, record.status
        )));
    }
    if !table.permits(record.status, outcome) {
        return Err(QueueError::Validation(format!(
            "transition {} -> {outcome} is not permitted",
            record.status
        )));
    }
    let review_note = match review_note.map(str::trim) {
        Some("") => {
            return Err(QueueError::Validation("review note must not be empty".to_string()))
        }
        other => other,
    };

    let mut next = record.clone();
    next.status = outcome;
    next.reviewed_by = Some(reviewer.id.clone());
    next.reviewed_at = Some(at);
    next.updated_at = Some(at);
    if let Some(text) = review_note {
        next.notes.push(note(text, reviewer, at));
    }
    let side_effects = effects_for(table, &next)?;
    Ok(TransitionOutput { next, side_effects })
}

fn check_not_terminal(table: &TransitionTable, record: &CanonicalRecord) -> Result<(), QueueError> {
    if table.is_terminal(record.status) {
        return Err(QueueError::Conflict(format!(
            "record {} is in terminal status {}",
            record.id, record.status
        )));
    }
    Ok(())
}

fn effects_for(
    table: &TransitionTable,
    next: &CanonicalRecord,
) -> Result<Vec<SideEffect>, QueueError> {
    table
        .effects_on_enter(next.status)
        .iter()
        .map(|effect| match effect {
            EffectKind::DeleteSubject => {
                if next.subject_id.trim().is_empty() {
                    return Err(QueueError::Validation(format!(
                        "record {} has no subject to delete",
                        next.id
                    )));
                }
                Ok(SideEffect::DeleteSubject {
                    kind: next.kind,
                    record_id: next.id.clone(),
                    subject_id: next.subject_id.clone(),
                })
            }
        })
        .collect()
}

fn note(text: &str, reviewer: &ReviewerIdentity, at: DateTime<Utc>) -> AuditNote {
    AuditNote {
        text: text.to_string(),
        author_id: reviewer.id.clone(),
        author_role: Some(reviewer.role),
        at: Some(at),
    }
}
