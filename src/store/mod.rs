//! Collaborator store contract.
//!
//! The store persists records and is the source of truth for whether a transition is
//! valid; the engine's local state machine is only a pre-check.

pub mod http;
pub mod memory;

use crate::access::ReviewerIdentity;
use crate::error::StoreError;
use crate::record::{AuditNote, RecordStatus};
use crate::review::ReviewAction;
use crate::types::QueueKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use http::HttpQueueStore;
pub use memory::{InMemoryQueueStore, StoreOp};

/// Item exactly as the store returned it
pub type RawItem = Value;

/// Server-side list filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
}

/// Cooperative cancellation token handed to every list call.
///
/// A ticket is cancelled once a newer fetch generation has started. Stores may check
/// it to skip work; the refresh controller always checks it before applying results.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl FetchTicket {
    pub(crate) fn new(generation: u64, current: Arc<AtomicU64>) -> Self {
        Self {
            generation,
            current,
        }
    }

    /// Ticket that is never cancelled, for one-shot fetches outside a controller
    pub fn detached() -> Self {
        Self::new(0, Arc::new(AtomicU64::new(0)))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.current.load(Ordering::Acquire) != self.generation
    }
}

/// Mutation sent to the store for status-changing actions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionRequest {
    #[serde(flatten)]
    pub action: ReviewAction,
    pub reviewer: ReviewerIdentity,
    pub at: DateTime<Utc>,
}

/// Persistence collaborator the engine reads from and writes through
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// List every item of a queue, in any order
    async fn list(
        &self,
        kind: QueueKind,
        query: &ListQuery,
        ticket: &FetchTicket,
    ) -> Result<Vec<RawItem>, StoreError>;

    async fn get(&self, kind: QueueKind, id: &str) -> Result<RawItem, StoreError>;

    async fn transition(
        &self,
        kind: QueueKind,
        id: &str,
        request: &TransitionRequest,
    ) -> Result<RawItem, StoreError>;

    async fn append_note(
        &self,
        kind: QueueKind,
        id: &str,
        note: &AuditNote,
    ) -> Result<RawItem, StoreError>;

    /// Hard-delete a subject entity; only invoked after an approved deletion request
    async fn remove(&self, subject_id: &str) -> Result<(), StoreError>;

    fn store_name(&self) -> &str;
}
