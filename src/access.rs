//! Reviewer identity and the access policy gating every queue.
//!
//! Policy evaluation depends only on the reviewer and the queue/tab key. It never
//! looks at record contents, so a record cannot influence its own visibility.

use crate::error::QueueError;
use crate::types::{QueueKind, ScopeKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Reviewer role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewerRole {
    /// Full access to every queue and tab
    Admin,
    /// Access limited to the reviewer's scope set
    Scoped,
}

impl ReviewerRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewerRole::Admin => "admin",
            ReviewerRole::Scoped => "scoped",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(ReviewerRole::Admin),
            "scoped" | "staff" | "moderator" => Some(ReviewerRole::Scoped),
            _ => None,
        }
    }
}

/// An authenticated reviewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerIdentity {
    pub id: String,
    pub role: ReviewerRole,
    /// Ignored for admins, who implicitly hold every scope
    #[serde(default)]
    pub scopes: BTreeSet<ScopeKey>,
}

impl ReviewerIdentity {
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: ReviewerRole::Admin,
            scopes: BTreeSet::new(),
        }
    }

    pub fn scoped<I, K>(id: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ScopeKey>,
    {
        Self {
            id: id.into(),
            role: ReviewerRole::Scoped,
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether the reviewer may view and act on `key`
    pub fn can_access(&self, key: &ScopeKey) -> bool {
        can_access(self, key)
    }

    /// Verify queue access, producing an authorization error on denial
    pub fn verify_access(&self, kind: QueueKind) -> Result<(), QueueError> {
        if !self.can_access(&kind.scope_key()) {
            return Err(QueueError::Authorization(format!(
                "Reviewer {} (role: {}) cannot access queue {}",
                self.id,
                self.role.as_str(),
                kind
            )));
        }
        Ok(())
    }
}

/// Total, side-effect-free access check over `(reviewer, key)`
pub fn can_access(reviewer: &ReviewerIdentity, key: &ScopeKey) -> bool {
    match reviewer.role {
        ReviewerRole::Admin => true,
        ReviewerRole::Scoped => reviewer.scopes.contains(key),
    }
}

/// Queue-wide gate applied before any per-record filtering.
///
/// A reviewer who cannot see the queue gets an empty slice, never a partial one.
pub fn visible_in_queue<'a, T>(
    reviewer: &ReviewerIdentity,
    kind: QueueKind,
    items: &'a [T],
) -> &'a [T] {
    if can_access(reviewer, &kind.scope_key()) {
        items
    } else {
        &[]
    }
}
