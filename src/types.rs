//! Shared identifiers for queues and access scopes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a record within its queue
pub type RecordId = String;

/// Identifier of the user or entity a record concerns
pub type SubjectId = String;

/// Which moderation queue a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QueueKind {
    #[serde(rename = "support")]
    Support,
    #[serde(rename = "accountDeletion")]
    AccountDeletion,
}

impl QueueKind {
    pub const ALL: [QueueKind; 2] = [QueueKind::Support, QueueKind::AccountDeletion];

    /// Stable key used in reviewer scopes and on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            QueueKind::Support => "support",
            QueueKind::AccountDeletion => "accountDeletion",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "support" | "tickets" | "support-tickets" => Some(QueueKind::Support),
            "accountDeletion" | "account-deletion" | "account_deletion" | "deletion" => {
                Some(QueueKind::AccountDeletion)
            }
            _ => None,
        }
    }

    pub fn scope_key(self) -> ScopeKey {
        ScopeKey::from(self)
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queue or console tab key a scoped reviewer may be granted.
///
/// Queue kinds map onto their own key; other console tabs (e.g. `lawyers`)
/// are plain strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeKey(String);

impl ScopeKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<QueueKind> for ScopeKey {
    fn from(kind: QueueKind) -> Self {
        ScopeKey(kind.as_str().to_string())
    }
}

impl From<&str> for ScopeKey {
    fn from(key: &str) -> Self {
        ScopeKey(key.to_string())
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
