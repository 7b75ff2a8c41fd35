//! Canonicalization totality and idempotence over generated payloads

use docket::canonical::{canonicalize, to_raw};
use docket::record::RecordStatus;
use docket::types::QueueKind;
use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use serde_json::{json, Map, Value};

const KEYS: &[&str] = &[
    "id",
    "_id",
    "subjectId",
    "userId",
    "name",
    "email",
    "phone",
    "message",
    "title",
    "body",
    "reason",
    "status",
    "createdAt",
    "timestamp",
    "updatedAt",
    "notes",
    "answers",
    "reviewedBy",
    "reviewedAt",
    "category",
    "_seconds",
    "$date",
];

fn kind_strategy() -> impl Strategy<Value = QueueKind> {
    prop_oneof![Just(QueueKind::Support), Just(QueueKind::AccountDeletion)]
}

/// Arbitrary JSON, biased toward keys the decoders look at
fn any_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<f64>().prop_map(Value::from),
        ".{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 48, 6, |inner| {
        let key = prop_oneof![
            prop::sample::select(KEYS).prop_map(str::to_string),
            "[a-z]{1,6}",
        ];
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec((key, inner), 0..6)
                .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

#[test]
fn test_canonicalize_never_panics_property() {
    let mut runner = TestRunner::new(Config::with_cases(512));

    runner
        .run(&(kind_strategy(), any_json()), |(kind, raw)| {
            let record = canonicalize(kind, &raw);
            prop_assert_eq!(record.kind, kind);
            prop_assert!(RecordStatus::all(kind).contains(&record.status));
            // Deterministic: no clock, no randomness
            prop_assert_eq!(canonicalize(kind, &raw), record);
            Ok(())
        })
        .unwrap();
}

/// Seconds between 1970 and 2100
fn epoch_seconds() -> impl Strategy<Value = i64> {
    0i64..4_102_444_800
}

fn timestamp() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        epoch_seconds().prop_map(|s| json!({ "_seconds": s, "_nanoseconds": 0 })),
        (epoch_seconds(), 0i64..1_000_000_000)
            .prop_map(|(s, n)| json!({ "seconds": s, "nanoseconds": n })),
        epoch_seconds().prop_map(|s| json!(s)),
        epoch_seconds().prop_map(|s| json!(s * 1000 + 123)),
        epoch_seconds().prop_map(|s| {
            let at = chrono::DateTime::from_timestamp(s, 0).unwrap_or_default();
            json!(at.to_rfc3339())
        }),
        Just(json!("not a date")),
        // Beyond four-digit years in both directions
        (-100_000_000_000i64..400_000_000_000).prop_map(|s| json!({ "_seconds": s })),
    ]
}

fn status() -> impl Strategy<Value = Value> {
    prop::sample::select(vec![
        "new",
        "PENDING",
        "in-progress",
        "RESOLVED",
        "closed",
        "pending",
        "approved",
        "denied",
        "escalated",
        "",
    ])
    .prop_map(Value::from)
}

fn note() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-z ]{0,16}".prop_map(Value::String),
        ("[a-z ]{0,16}", "[a-z0-9-]{0,8}", prop::sample::select(vec!["admin", "staff", "x"]), timestamp())
            .prop_map(|(text, author, role, at)| {
                json!({ "text": text, "authorId": author, "role": role, "at": at })
            }),
    ]
}

/// Payloads shaped like what the store actually sends, in either wire shape
fn realistic_payload() -> impl Strategy<Value = Value> {
    let current = (
        prop::option::of("[a-z0-9-]{1,8}"),
        prop::sample::select(vec!["subjectId", "userId"]),
        "[a-z0-9@.]{1,10}",
        prop::option::of("[A-Za-z ]{0,20}"),
        prop::option::of("[A-Za-z ]{0,40}"),
        prop::option::of(status()),
        timestamp(),
        prop::collection::vec(note(), 0..3),
        prop::option::of("[a-z]{1,8}"),
        prop::option::of("[a-z@.]{1,12}"),
    )
        .prop_map(
            |(id, subject_key, subject, title, body, status, created, notes, category, email)| {
                let mut map = Map::new();
                if let Some(id) = id {
                    map.insert("id".to_string(), json!(id));
                }
                map.insert(subject_key.to_string(), json!(subject));
                if let Some(title) = title {
                    map.insert("subject".to_string(), json!(title));
                }
                if let Some(body) = body {
                    map.insert("message".to_string(), json!(body));
                }
                if let Some(status) = status {
                    map.insert("status".to_string(), status);
                }
                map.insert("createdAt".to_string(), created);
                map.insert("answers".to_string(), Value::Array(notes));
                if let Some(category) = category {
                    map.insert("category".to_string(), json!(category));
                }
                if let Some(email) = email {
                    map.insert("email".to_string(), json!(email));
                }
                Value::Object(map)
            },
        );

    let legacy = (
        prop::option::of("[A-Za-z ]{0,12}"),
        prop::option::of("[a-z@.]{1,12}"),
        prop::option::of(prop_oneof![
            "[0-9]{3,7}".prop_map(Value::String),
            (100i64..9_999_999).prop_map(Value::from),
        ]),
        prop::option::of("[A-Za-z ]{0,30}"),
        prop::option::of(status()),
        timestamp(),
        prop::option::of("[a-z]{1,8}"),
    )
        .prop_map(|(name, email, phone, message, status, created, source)| {
            let mut map = Map::new();
            // At least one contact field so the payload reads as legacy
            map.insert(
                "name".to_string(),
                json!(name.unwrap_or_else(|| "anon".to_string())),
            );
            if let Some(email) = email {
                map.insert("email".to_string(), json!(email));
            }
            if let Some(phone) = phone {
                map.insert("phone".to_string(), phone);
            }
            if let Some(message) = message {
                map.insert("message".to_string(), json!(message));
            }
            if let Some(status) = status {
                map.insert("status".to_string(), status);
            }
            map.insert("timestamp".to_string(), created);
            if let Some(source) = source {
                map.insert("source".to_string(), json!(source));
            }
            Value::Object(map)
        });

    prop_oneof![current, legacy]
}

#[test]
fn test_canonicalize_idempotent_property() {
    let mut runner = TestRunner::new(Config::with_cases(512));

    runner
        .run(&(kind_strategy(), realistic_payload()), |(kind, raw)| {
            let once = canonicalize(kind, &raw);
            let twice = canonicalize(kind, &to_raw(&once));
            prop_assert_eq!(twice, once);
            Ok(())
        })
        .unwrap();
}
