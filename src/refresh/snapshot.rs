//! Immutable queue snapshots.
//!
//! A snapshot is never mutated in place: every refresh or provisional merge builds a
//! new one and swaps the shared pointer, so readers never see a half-updated list.

use crate::record::CanonicalRecord;
use crate::types::RecordId;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Records in store order plus an id -> position index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    version: u64,
    records: Vec<CanonicalRecord>,
    index: HashMap<RecordId, usize>,
}

impl Snapshot {
    pub fn new(version: u64, records: Vec<CanonicalRecord>) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            index.entry(record.id.clone()).or_insert(position);
        }
        Self {
            version,
            records,
            index,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&CanonicalRecord> {
        self.index.get(id).and_then(|position| self.records.get(*position))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copy with `record` replacing the entry of the same id, or appended if new
    pub fn with_record(&self, version: u64, record: CanonicalRecord) -> Snapshot {
        let mut records = self.records.clone();
        match self.index.get(&record.id) {
            Some(position) => records[*position] = record,
            None => records.push(record),
        }
        Snapshot::new(version, records)
    }

    /// Ids added, removed, or structurally changed going from `self` to `next`
    pub fn diff(&self, next: &Snapshot) -> SnapshotDiff {
        let mut diff = SnapshotDiff::default();
        let mut seen = HashSet::new();
        for record in &next.records {
            if !seen.insert(record.id.as_str()) {
                continue;
            }
            match self.get(&record.id) {
                None => diff.added.push(record.id.clone()),
                Some(previous) if previous != record => diff.changed.push(record.id.clone()),
                Some(_) => {}
            }
        }
        diff.removed = self
            .index
            .keys()
            .filter(|id| !next.index.contains_key(*id))
            .cloned()
            .collect();
        diff.removed.sort();
        diff
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    pub added: Vec<RecordId>,
    pub removed: Vec<RecordId>,
    pub changed: Vec<RecordId>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}
