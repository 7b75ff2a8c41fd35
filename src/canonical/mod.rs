//! Canonicalizer
//!
//! Maps every accepted wire shape of a queue item onto [`CanonicalRecord`]. The mapping
//! is total and deterministic: malformed fields degrade to empty defaults, nothing is
//! logged, and no clock or randomness is consulted, so canonicalizing the same payload
//! twice yields structurally equal records.

mod shape;
pub mod timestamp;

use crate::access::ReviewerRole;
use crate::record::{AuditNote, CanonicalRecord, RecordStatus};
use crate::types::QueueKind;
use serde_json::{json, Map, Value};
use shape::{WireShape, MODELED_KEYS};
use std::collections::BTreeMap;

pub use timestamp::{format_timestamp, parse_timestamp};

const ID_KEYS: &[&str] = &["id", "_id"];
const CREATED_KEYS: &[&str] = &["createdAt", "created_at", "timestamp", "requestedAt"];
const UPDATED_KEYS: &[&str] = &["updatedAt", "updated_at"];
const CONTACT_KEYS: &[&str] = &["name", "email", "phone"];

/// Normalize `raw` into a canonical record of queue `kind`. Never fails.
pub fn canonicalize(kind: QueueKind, raw: &Value) -> CanonicalRecord {
    match shape::detect(raw) {
        WireShape::Current(map) => decode_current(kind, map),
        WireShape::Legacy(map) => decode_legacy(kind, map),
        WireShape::Unrecognized(Some(map)) => decode_current(kind, map),
        WireShape::Unrecognized(None) => CanonicalRecord::empty(kind),
    }
}

/// Re-emit a record in the current wire shape.
///
/// `canonicalize(kind, &to_raw(&record)) == record` for every record `canonicalize`
/// produces.
pub fn to_raw(record: &CanonicalRecord) -> Value {
    let mut map = Map::new();
    for (key, value) in &record.extras {
        map.insert(key.clone(), value.clone());
    }

    let notes: Vec<Value> = record
        .notes
        .iter()
        .map(|note| {
            json!({
                "text": note.text,
                "authorId": note.author_id,
                "authorRole": note.author_role.map(ReviewerRole::as_str),
                "at": note.at.as_ref().map(format_timestamp),
            })
        })
        .collect();

    map.insert("id".to_string(), json!(record.id));
    map.insert("subjectId".to_string(), json!(record.subject_id));
    map.insert("title".to_string(), json!(record.title));
    map.insert("body".to_string(), json!(record.body));
    map.insert("status".to_string(), json!(record.status.as_wire()));
    map.insert(
        "createdAt".to_string(),
        json!(record.created_at.as_ref().map(format_timestamp)),
    );
    map.insert(
        "updatedAt".to_string(),
        json!(record.updated_at.as_ref().map(format_timestamp)),
    );
    map.insert("notes".to_string(), Value::Array(notes));
    map.insert("reviewedBy".to_string(), json!(record.reviewed_by));
    map.insert(
        "reviewedAt".to_string(),
        json!(record.reviewed_at.as_ref().map(format_timestamp)),
    );

    Value::Object(map)
}

fn decode_current(kind: QueueKind, map: &Map<String, Value>) -> CanonicalRecord {
    let mut record = decode_common(kind, map);
    record.subject_id = identifier(map, &["subjectId", "userId"]).unwrap_or_default();
    record.title = text(map, &["title", "subject"])
        .map(str::to_string)
        .unwrap_or_else(|| default_title(kind).to_string());
    record.body = text(map, &["body", "message", "description", "reason"])
        .unwrap_or_default()
        .to_string();
    // Contact fields only feed the legacy decoder; structured payloads keep them as tags
    for key in CONTACT_KEYS {
        if let Some(value) = map.get(*key) {
            record.extras.insert(key.to_string(), value.clone());
        }
    }
    record
}

fn decode_legacy(kind: QueueKind, map: &Map<String, Value>) -> CanonicalRecord {
    let mut record = decode_common(kind, map);

    let name = non_empty(text(map, &["name"]));
    let email = non_empty(text(map, &["email"]));
    let phone = non_empty(identifier(map, &["phone"]).as_deref()).map(str::to_string);
    let message = non_empty(text(map, &["message"]));

    record.subject_id = email
        .map(str::to_string)
        .or_else(|| phone.clone())
        .unwrap_or_default();

    record.title = match (name, email) {
        (Some(name), _) => format!("Contact from {name}"),
        (None, Some(email)) => format!("Contact from {email}"),
        (None, None) => default_title(kind).to_string(),
    };

    let mut lines = Vec::new();
    if let Some(message) = message {
        lines.push(message.to_string());
    }
    let contact: Vec<String> = [
        name.map(|v| format!("Name: {v}")),
        email.map(|v| format!("Email: {v}")),
        phone.map(|v| format!("Phone: {v}")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !contact.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.extend(contact);
    }
    record.body = lines.join("\n");
    record
}

/// Fields decoded identically for every shape
fn decode_common(kind: QueueKind, map: &Map<String, Value>) -> CanonicalRecord {
    let mut record = CanonicalRecord::empty(kind);
    record.id = identifier(map, ID_KEYS).unwrap_or_default();
    record.status = text(map, &["status"])
        .and_then(|status| RecordStatus::parse(kind, status))
        .unwrap_or_else(|| RecordStatus::initial(kind));
    record.created_at = parse_timestamp(first(map, CREATED_KEYS));
    record.updated_at = parse_timestamp(first(map, UPDATED_KEYS));
    record.notes = decode_notes(first(map, &["notes", "answers"]));
    record.reviewed_by = non_empty(text(map, &["reviewedBy"])).map(str::to_string);
    record.reviewed_at = parse_timestamp(map.get("reviewedAt"));
    record.extras = extras(map);
    record
}

fn decode_notes(value: Option<&Value>) -> Vec<AuditNote> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(AuditNote {
                text: text.clone(),
                author_id: String::new(),
                author_role: None,
                at: None,
            }),
            Value::Object(note) => Some(AuditNote {
                text: text(note, &["text", "answer", "message"])
                    .unwrap_or_default()
                    .to_string(),
                author_id: identifier(note, &["authorId", "author", "by"]).unwrap_or_default(),
                author_role: text(note, &["authorRole", "role"]).and_then(ReviewerRole::parse),
                at: parse_timestamp(first(note, &["at", "createdAt", "timestamp"])),
            }),
            _ => None,
        })
        .collect()
}

fn extras(map: &Map<String, Value>) -> BTreeMap<String, Value> {
    map.iter()
        .filter(|(key, _)| !MODELED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn default_title(kind: QueueKind) -> &'static str {
    match kind {
        QueueKind::Support => "Support request",
        QueueKind::AccountDeletion => "Account deletion request",
    }
}

fn first<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
}

fn text<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| map.get(*key).and_then(Value::as_str))
}

/// String or numeric identifier, rendered as a string
fn identifier(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key) {
        Some(Value::String(value)) => Some(value.clone()),
        Some(Value::Number(value)) => Some(value.to_string()),
        _ => None,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
