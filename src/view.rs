//! Queue View Model
//!
//! Derives the visible, ordered subset of a snapshot from caller-supplied filters.
//! Holds no state; callers recompute whenever the snapshot or filters change.

use crate::record::{CanonicalRecord, RecordStatus};
use crate::types::QueueKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Ordering applied after filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Most recently created first
    #[default]
    Newest,
    Oldest,
    /// Title, case-insensitive (the contact name for legacy items)
    Title,
    Subject,
}

impl SortKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "newest" => Some(SortKey::Newest),
            "oldest" => Some(SortKey::Oldest),
            "title" | "name" => Some(SortKey::Title),
            "subject" => Some(SortKey::Subject),
            _ => None,
        }
    }
}

/// Local filter parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueFilters {
    /// Free-text, case-insensitive substring search
    pub search: Option<String>,
    pub status: Option<RecordStatus>,
    pub sort: SortKey,
}

impl QueueFilters {
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn status(mut self, status: RecordStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }
}

/// Unmodeled fields that are searchable, per queue
fn searchable_tags(kind: QueueKind) -> &'static [&'static str] {
    match kind {
        QueueKind::Support => &["category", "source"],
        QueueKind::AccountDeletion => &["email", "userName", "displayName"],
    }
}

/// Searchable text of a record; absent fields contribute nothing
pub fn search_text(record: &CanonicalRecord) -> String {
    let mut parts: Vec<&str> = vec![
        record.title.as_str(),
        record.body.as_str(),
        record.subject_id.as_str(),
    ];
    parts.extend(
        searchable_tags(record.kind)
            .iter()
            .filter_map(|key| record.tag(key)),
    );
    parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase()
}

fn matches(record: &CanonicalRecord, filters: &QueueFilters, needle: Option<&str>) -> bool {
    if let Some(status) = filters.status {
        if record.status != status {
            return false;
        }
    }
    match needle {
        Some(needle) => search_text(record).contains(needle),
        None => true,
    }
}

/// Missing timestamps sort after every present one, in either direction
fn by_time(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>, newest_first: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if newest_first => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Filter then stably sort `records`
pub fn visible<'a>(records: &'a [CanonicalRecord], filters: &QueueFilters) -> Vec<&'a CanonicalRecord> {
    let needle = filters
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase);

    let mut subset: Vec<&CanonicalRecord> = records
        .iter()
        .filter(|record| matches(record, filters, needle.as_deref()))
        .collect();

    // sort_by and sort_by_key are stable: equal keys keep snapshot order
    match filters.sort {
        SortKey::Newest => subset.sort_by(|a, b| by_time(a.created_at, b.created_at, true)),
        SortKey::Oldest => subset.sort_by(|a, b| by_time(a.created_at, b.created_at, false)),
        SortKey::Title => subset.sort_by_key(|record| record.title.to_lowercase()),
        SortKey::Subject => subset.sort_by_key(|record| record.subject_id.to_lowercase()),
    }
    subset
}
