//! Wire shape detection.
//!
//! Shapes are told apart by the fields they carry, never by an explicit version tag.

use serde_json::{Map, Value};

/// Fields whose presence marks the structured ("current") payload
pub(crate) const CURRENT_DISCRIMINATORS: &[&str] = &["subjectId", "userId"];

/// Fields of the flat contact-form ("legacy") payload
pub(crate) const LEGACY_DISCRIMINATORS: &[&str] = &["name", "email", "phone", "message"];

/// Every key consumed by some decoder; the rest are retained as extras.
pub(crate) const MODELED_KEYS: &[&str] = &[
    "id",
    "_id",
    "subjectId",
    "userId",
    "title",
    "subject",
    "body",
    "message",
    "description",
    "reason",
    "status",
    "createdAt",
    "created_at",
    "timestamp",
    "requestedAt",
    "updatedAt",
    "updated_at",
    "notes",
    "answers",
    "reviewedBy",
    "reviewedAt",
    "name",
    "email",
    "phone",
];

#[derive(Debug, Clone, Copy)]
pub(crate) enum WireShape<'a> {
    Current(&'a Map<String, Value>),
    Legacy(&'a Map<String, Value>),
    /// An object with neither discriminator, or not an object at all
    Unrecognized(Option<&'a Map<String, Value>>),
}

pub(crate) fn detect(raw: &Value) -> WireShape<'_> {
    let Some(map) = raw.as_object() else {
        return WireShape::Unrecognized(None);
    };

    let has_any = |keys: &[&str]| {
        keys.iter()
            .any(|key| map.get(*key).map(is_scalar_identifier).unwrap_or(false))
    };

    if has_any(CURRENT_DISCRIMINATORS) {
        WireShape::Current(map)
    } else if has_any(LEGACY_DISCRIMINATORS) {
        WireShape::Legacy(map)
    } else {
        WireShape::Unrecognized(Some(map))
    }
}

fn is_scalar_identifier(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_))
}
