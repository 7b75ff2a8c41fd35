//! In-memory collaborator store.
//!
//! Keeps raw items per queue and enforces the same state machine a real server would,
//! so it can stand in for the backend in demos and tests. Failures can be scripted per
//! operation to exercise retry and rollback paths.

use super::{FetchTicket, ListQuery, QueueStore, RawItem, TransitionRequest};
use crate::canonical::{canonicalize, to_raw};
use crate::error::{ErrorKind, StoreError};
use crate::record::AuditNote;
use crate::review::ReviewMachine;
use crate::types::QueueKind;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::debug;

/// Store operation, used to script failures and count calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Get,
    Transition,
    AppendNote,
    Remove,
}

#[derive(Default)]
pub struct InMemoryQueueStore {
    items: RwLock<BTreeMap<QueueKind, Vec<RawItem>>>,
    removed_subjects: RwLock<BTreeSet<String>>,
    failures: Mutex<HashMap<StoreOp, VecDeque<StoreError>>>,
    calls: Mutex<HashMap<StoreOp, usize>>,
    machine: ReviewMachine,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with raw items per queue
    pub fn with_items(items: impl IntoIterator<Item = (QueueKind, Vec<RawItem>)>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.items.write();
            for (kind, raws) in items {
                guard.entry(kind).or_default().extend(raws);
            }
        }
        store
    }

    /// Load `{ "support": [...], "accountDeletion": [...] }` fixtures
    pub fn from_fixture(fixture: &Value) -> Result<Self, StoreError> {
        let map = fixture
            .as_object()
            .ok_or_else(|| StoreError::Decode("fixture must be a JSON object".to_string()))?;
        let mut items = Vec::new();
        for (key, value) in map {
            let kind = QueueKind::parse(key)
                .ok_or_else(|| StoreError::Decode(format!("unknown queue in fixture: {key}")))?;
            let raws = value
                .as_array()
                .ok_or_else(|| StoreError::Decode(format!("queue {key} must be an array")))?;
            items.push((kind, raws.clone()));
        }
        Ok(Self::with_items(items))
    }

    pub fn insert(&self, kind: QueueKind, raw: RawItem) {
        self.items.write().entry(kind).or_default().push(raw);
    }

    /// Drop an item, as if another console deleted it
    pub fn delete(&self, kind: QueueKind, id: &str) {
        if let Some(items) = self.items.write().get_mut(&kind) {
            items.retain(|raw| canonicalize(kind, raw).id != id);
        }
    }

    /// Make the next call of `op` fail with `error`; queued failures fire in order
    pub fn fail_next(&self, op: StoreOp, error: StoreError) {
        self.failures.lock().entry(op).or_default().push_back(error);
    }

    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    pub fn removed_subjects(&self) -> BTreeSet<String> {
        self.removed_subjects.read().clone()
    }

    fn enter(&self, op: StoreOp) -> Result<(), StoreError> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        match self.failures.lock().get_mut(&op).and_then(|queue| queue.pop_front()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn position(&self, kind: QueueKind, id: &str) -> Result<usize, StoreError> {
        self.items
            .read()
            .get(&kind)
            .and_then(|items| items.iter().position(|raw| canonicalize(kind, raw).id == id))
            .ok_or_else(|| StoreError::NotFound(format!("{kind}/{id}")))
    }

    fn replace(&self, kind: QueueKind, index: usize, raw: RawItem) -> RawItem {
        if let Some(slot) = self
            .items
            .write()
            .get_mut(&kind)
            .and_then(|items| items.get_mut(index))
        {
            *slot = raw.clone();
        }
        raw
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn list(
        &self,
        kind: QueueKind,
        query: &ListQuery,
        ticket: &FetchTicket,
    ) -> Result<Vec<RawItem>, StoreError> {
        self.enter(StoreOp::List)?;
        debug!(%kind, generation = ticket.generation(), "In-memory list");
        let items = self.items.read().get(&kind).cloned().unwrap_or_default();
        Ok(match query.status {
            Some(status) => items
                .into_iter()
                .filter(|raw| canonicalize(kind, raw).status == status)
                .collect(),
            None => items,
        })
    }

    async fn get(&self, kind: QueueKind, id: &str) -> Result<RawItem, StoreError> {
        self.enter(StoreOp::Get)?;
        let index = self.position(kind, id)?;
        self.items
            .read()
            .get(&kind)
            .and_then(|items| items.get(index).cloned())
            .ok_or_else(|| StoreError::NotFound(format!("{kind}/{id}")))
    }

    async fn transition(
        &self,
        kind: QueueKind,
        id: &str,
        request: &TransitionRequest,
    ) -> Result<RawItem, StoreError> {
        self.enter(StoreOp::Transition)?;
        let index = self.position(kind, id)?;
        let current = self
            .items
            .read()
            .get(&kind)
            .and_then(|items| items.get(index).cloned())
            .ok_or_else(|| StoreError::NotFound(format!("{kind}/{id}")))?;

        let record = canonicalize(kind, &current);
        let output = self
            .machine
            .apply(&record, &request.action, &request.reviewer, request.at)
            .map_err(|err| StoreError::Rejected {
                status: status_for(err.kind()),
                message: err.to_string(),
            })?;
        Ok(self.replace(kind, index, to_raw(&output.next)))
    }

    async fn append_note(
        &self,
        kind: QueueKind,
        id: &str,
        note: &AuditNote,
    ) -> Result<RawItem, StoreError> {
        self.enter(StoreOp::AppendNote)?;
        if note.text.trim().is_empty() {
            return Err(StoreError::Rejected {
                status: 422,
                message: "note text must not be empty".to_string(),
            });
        }
        let index = self.position(kind, id)?;
        let current = self
            .items
            .read()
            .get(&kind)
            .and_then(|items| items.get(index).cloned())
            .ok_or_else(|| StoreError::NotFound(format!("{kind}/{id}")))?;

        let mut record = canonicalize(kind, &current);
        record.notes.push(note.clone());
        record.updated_at = note.at.or(record.updated_at);
        Ok(self.replace(kind, index, to_raw(&record)))
    }

    async fn remove(&self, subject_id: &str) -> Result<(), StoreError> {
        self.enter(StoreOp::Remove)?;
        if !self.removed_subjects.write().insert(subject_id.to_string()) {
            return Err(StoreError::NotFound(format!("subject {subject_id}")));
        }
        Ok(())
    }

    fn store_name(&self) -> &str {
        "memory"
    }
}

fn status_for(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::Authorization => 403,
        ErrorKind::Conflict => 409,
        _ => 422,
    }
}
