//! Side effects as data.
//!
//! The state machine emits these tokens; the engine performs them against the store
//! after the transition has been accepted.

use crate::types::{QueueKind, RecordId, SubjectId};
use serde::{Deserialize, Serialize};

/// Effect a transition table attaches to entering a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Hard-delete the entity the record concerns
    DeleteSubject,
}

/// A concrete effect produced by a transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum SideEffect {
    /// Irreversible removal of the subject entity
    DeleteSubject {
        kind: QueueKind,
        record_id: RecordId,
        subject_id: SubjectId,
    },
}

impl SideEffect {
    pub fn describe(&self) -> String {
        match self {
            SideEffect::DeleteSubject {
                kind,
                record_id,
                subject_id,
            } => format!("delete subject {subject_id} (approved {kind} record {record_id})"),
        }
    }
}
