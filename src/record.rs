//! Canonical record model shared by every queue.

use crate::access::ReviewerRole;
use crate::types::{QueueKind, RecordId, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Support ticket lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SupportStatus {
    Pending,
    InProgress,
    Resolved,
    Closed,
}

/// Account-deletion request lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeletionStatus {
    Pending,
    Approved,
    Rejected,
}

/// Status of a record, tagged by the queue whose vocabulary it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordStatus {
    Support(SupportStatus),
    AccountDeletion(DeletionStatus),
}

impl RecordStatus {
    /// Initial status of a queue's state machine
    pub fn initial(kind: QueueKind) -> Self {
        match kind {
            QueueKind::Support => RecordStatus::Support(SupportStatus::Pending),
            QueueKind::AccountDeletion => RecordStatus::AccountDeletion(DeletionStatus::Pending),
        }
    }

    pub fn kind(self) -> QueueKind {
        match self {
            RecordStatus::Support(_) => QueueKind::Support,
            RecordStatus::AccountDeletion(_) => QueueKind::AccountDeletion,
        }
    }

    /// Every status of a queue, in lifecycle order
    pub fn all(kind: QueueKind) -> Vec<RecordStatus> {
        match kind {
            QueueKind::Support => [
                SupportStatus::Pending,
                SupportStatus::InProgress,
                SupportStatus::Resolved,
                SupportStatus::Closed,
            ]
            .into_iter()
            .map(RecordStatus::Support)
            .collect(),
            QueueKind::AccountDeletion => [
                DeletionStatus::Pending,
                DeletionStatus::Approved,
                DeletionStatus::Rejected,
            ]
            .into_iter()
            .map(RecordStatus::AccountDeletion)
            .collect(),
        }
    }

    /// Canonical wire spelling
    pub fn as_wire(self) -> &'static str {
        match self {
            RecordStatus::Support(SupportStatus::Pending) => "PENDING",
            RecordStatus::Support(SupportStatus::InProgress) => "IN_PROGRESS",
            RecordStatus::Support(SupportStatus::Resolved) => "RESOLVED",
            RecordStatus::Support(SupportStatus::Closed) => "CLOSED",
            RecordStatus::AccountDeletion(DeletionStatus::Pending) => "pending",
            RecordStatus::AccountDeletion(DeletionStatus::Approved) => "approved",
            RecordStatus::AccountDeletion(DeletionStatus::Rejected) => "rejected",
        }
    }

    /// Parse a status string in the vocabulary of `kind`.
    ///
    /// Accepts canonical spellings case-insensitively along with the legacy
    /// vocabulary; returns `None` for anything unrecognized.
    pub fn parse(kind: QueueKind, value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match kind {
            QueueKind::Support => {
                let status = match normalized.as_str() {
                    "pending" | "new" | "open" | "unread" | "received" => SupportStatus::Pending,
                    "in_progress" | "inprogress" | "processing" | "working" => {
                        SupportStatus::InProgress
                    }
                    "resolved" | "answered" | "done" => SupportStatus::Resolved,
                    "closed" => SupportStatus::Closed,
                    _ => return None,
                };
                Some(RecordStatus::Support(status))
            }
            QueueKind::AccountDeletion => {
                let status = match normalized.as_str() {
                    "pending" | "new" | "requested" => DeletionStatus::Pending,
                    "approved" | "accepted" => DeletionStatus::Approved,
                    "rejected" | "denied" | "declined" => DeletionStatus::Rejected,
                    _ => return None,
                };
                Some(RecordStatus::AccountDeletion(status))
            }
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl Serialize for RecordStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

/// Immutable entry in a record's audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditNote {
    pub text: String,
    pub author_id: String,
    pub author_role: Option<ReviewerRole>,
    pub at: Option<DateTime<Utc>>,
}

/// The normalized queue item every wire shape is reduced to
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub id: RecordId,
    pub kind: QueueKind,
    pub subject_id: SubjectId,
    pub title: String,
    pub body: String,
    pub status: RecordStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Append-only, oldest first
    pub notes: Vec<AuditNote>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Wire fields the canonical shape does not model (category, source, ...)
    pub extras: BTreeMap<String, Value>,
}

impl CanonicalRecord {
    /// Empty record in the initial status of `kind`
    pub fn empty(kind: QueueKind) -> Self {
        Self {
            id: String::new(),
            kind,
            subject_id: String::new(),
            title: String::new(),
            body: String::new(),
            status: RecordStatus::initial(kind),
            created_at: None,
            updated_at: None,
            notes: Vec::new(),
            reviewed_by: None,
            reviewed_at: None,
            extras: BTreeMap::new(),
        }
    }

    /// String-valued unmodeled field, e.g. `category` or `source`
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.extras.get(key).and_then(Value::as_str)
    }

    pub fn is_reviewed(&self) -> bool {
        self.reviewed_by.is_some()
    }
}
