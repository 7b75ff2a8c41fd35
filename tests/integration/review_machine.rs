//! Review state machine: deletion monotonicity, support regression, approval scenario

use chrono::{DateTime, Duration, TimeZone, Utc};
use docket::access::ReviewerIdentity;
use docket::canonical::canonicalize;
use docket::error::ErrorKind;
use docket::record::{CanonicalRecord, DeletionStatus, RecordStatus, SupportStatus};
use docket::review::{ReviewAction, ReviewMachine, SideEffect, TransitionTable};
use docket::types::QueueKind;
use serde_json::json;

fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn approved() -> RecordStatus {
    RecordStatus::AccountDeletion(DeletionStatus::Approved)
}

fn rejected() -> RecordStatus {
    RecordStatus::AccountDeletion(DeletionStatus::Rejected)
}

fn support(status: SupportStatus) -> RecordStatus {
    RecordStatus::Support(status)
}

fn deletion_request() -> CanonicalRecord {
    canonicalize(
        QueueKind::AccountDeletion,
        &json!({ "id": "d-1", "userId": "user-42", "reason": "moving on", "status": "pending" }),
    )
}

fn ticket(status: SupportStatus) -> CanonicalRecord {
    let mut record = canonicalize(
        QueueKind::Support,
        &json!({ "id": "t-1", "subjectId": "user-7", "title": "Cannot log in" }),
    );
    record.status = support(status);
    record
}

#[test]
fn test_approval_scenario_emits_delete_and_blocks_second_review() {
    let machine = ReviewMachine::new();
    let admin = ReviewerIdentity::admin("admin-1");
    let record = deletion_request();

    let out = machine
        .apply(
            &record,
            &ReviewAction::Review {
                outcome: approved(),
                note: None,
            },
            &admin,
            at(),
        )
        .unwrap();

    assert_eq!(out.next.status, approved());
    assert_eq!(out.next.status.as_wire(), "approved");
    assert_eq!(out.next.reviewed_by.as_deref(), Some("admin-1"));
    assert_eq!(out.next.reviewed_at, Some(at()));
    assert_eq!(
        out.side_effects,
        vec![SideEffect::DeleteSubject {
            kind: QueueKind::AccountDeletion,
            record_id: "d-1".to_string(),
            subject_id: "user-42".to_string(),
        }]
    );

    let second = machine
        .apply(
            &out.next,
            &ReviewAction::Review {
                outcome: rejected(),
                note: Some("changed my mind".to_string()),
            },
            &ReviewerIdentity::admin("admin-2"),
            at() + Duration::minutes(5),
        )
        .unwrap_err();
    assert_eq!(second.kind(), ErrorKind::Conflict);
}

#[test]
fn test_deletion_status_never_changes_after_decision() {
    let machine = ReviewMachine::new();
    let admin = ReviewerIdentity::admin("admin-1");

    for outcome in [approved(), rejected()] {
        let decided = machine
            .apply(
                &deletion_request(),
                &ReviewAction::Review {
                    outcome,
                    note: None,
                },
                &admin,
                at(),
            )
            .unwrap()
            .next;

        let attempts = [
            ReviewAction::Review {
                outcome: approved(),
                note: None,
            },
            ReviewAction::Review {
                outcome: rejected(),
                note: None,
            },
            ReviewAction::Transition {
                to: RecordStatus::initial(QueueKind::AccountDeletion),
            },
            ReviewAction::Transition { to: approved() },
            ReviewAction::AppendAnswer {
                text: "hello".to_string(),
            },
        ];
        for action in attempts {
            let before = decided.clone();
            let result = machine.apply(&decided, &action, &admin, at() + Duration::hours(1));
            assert!(result.is_err(), "{action:?} accepted on {outcome}");
            assert_eq!(decided, before);
        }

        let err = machine
            .apply(
                &decided,
                &ReviewAction::Review {
                    outcome,
                    note: None,
                },
                &admin,
                at(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}

#[test]
fn test_rejection_with_note_keeps_audit_order() {
    let machine = ReviewMachine::new();
    let mut record = deletion_request();
    record.notes = canonicalize(
        QueueKind::AccountDeletion,
        &json!({ "userId": "user-42", "notes": [
            { "text": "later note", "authorId": "staff-2", "at": "2024-06-02T00:00:00Z" },
            { "text": "earlier note", "authorId": "staff-1", "at": "2024-05-01T00:00:00Z" }
        ] }),
    )
    .notes;

    let out = machine
        .apply(
            &record,
            &ReviewAction::Review {
                outcome: rejected(),
                note: Some("outstanding balance".to_string()),
            },
            &ReviewerIdentity::admin("admin-1"),
            at(),
        )
        .unwrap();

    let texts: Vec<&str> = out.next.notes.iter().map(|n| n.text.as_str()).collect();
    // Append order, not timestamp order
    assert_eq!(texts, vec!["later note", "earlier note", "outstanding balance"]);
    assert!(out.side_effects.is_empty());
}

/// The support queue is the one lifecycle that allows moving backwards. Reopening a
/// resolved ticket is intended workflow, not a regression bug.
#[test]
fn test_support_resolved_back_to_in_progress_is_intentional() {
    let machine = ReviewMachine::new();
    let out = machine
        .apply(
            &ticket(SupportStatus::Resolved),
            &ReviewAction::Transition {
                to: support(SupportStatus::InProgress),
            },
            &ReviewerIdentity::admin("admin-1"),
            at(),
        )
        .unwrap();
    assert_eq!(out.next.status, support(SupportStatus::InProgress));
    assert!(out.side_effects.is_empty());
}

#[test]
fn test_support_table_shape() {
    let table = TransitionTable::support();
    let closed = support(SupportStatus::Closed);
    let open = [
        SupportStatus::Pending,
        SupportStatus::InProgress,
        SupportStatus::Resolved,
    ];

    for from in open {
        // Every non-terminal status may close directly
        assert!(table.permits(support(from), closed));
        for to in open.into_iter().filter(|to| *to != from) {
            assert!(table.permits(support(from), support(to)), "{from:?} -> {to:?}");
        }
    }
    for to in open {
        assert!(!table.permits(closed, support(to)));
    }
    assert!(table.is_terminal(closed));
}

#[test]
fn test_deletion_table_is_forward_only() {
    let table = TransitionTable::account_deletion();
    let pending = RecordStatus::initial(QueueKind::AccountDeletion);
    assert!(table.permits(pending, approved()));
    assert!(table.permits(pending, rejected()));
    assert!(!table.permits(approved(), pending));
    assert!(!table.permits(rejected(), pending));
    assert!(!table.permits(approved(), rejected()));
}

#[test]
fn test_closed_ticket_is_conflict() {
    let err = ReviewMachine::new()
        .apply(
            &ticket(SupportStatus::Closed),
            &ReviewAction::Transition {
                to: support(SupportStatus::InProgress),
            },
            &ReviewerIdentity::admin("admin-1"),
            at(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn test_answers_append_without_status_change() {
    let machine = ReviewMachine::new();
    let reviewer = ReviewerIdentity::scoped("staff-1", [QueueKind::Support]);
    let first = machine
        .apply(
            &ticket(SupportStatus::Pending),
            &ReviewAction::AppendAnswer {
                text: "Can you send a screenshot?".to_string(),
            },
            &reviewer,
            at(),
        )
        .unwrap();
    let second = machine
        .apply(
            &first.next,
            &ReviewAction::AppendAnswer {
                text: "Thanks, fixed.".to_string(),
            },
            &reviewer,
            at() - Duration::minutes(1),
        )
        .unwrap();

    assert_eq!(second.next.status, support(SupportStatus::Pending));
    assert_eq!(second.next.notes.len(), 2);
    assert_eq!(second.next.notes[0].text, "Can you send a screenshot?");
    assert_eq!(second.next.notes[1].text, "Thanks, fixed.");
    assert_eq!(second.next.notes[1].author_id, "staff-1");
}

#[test]
fn test_deletion_queue_rejects_answers() {
    let err = ReviewMachine::new()
        .apply(
            &deletion_request(),
            &ReviewAction::AppendAnswer {
                text: "hello".to_string(),
            },
            &ReviewerIdentity::admin("admin-1"),
            at(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_unauthorized_reviewer_rejected_before_table() {
    let outsider = ReviewerIdentity::scoped("staff-9", ["lawyers"]);
    // Closed tickets would be a conflict, but authorization is checked first
    let err = ReviewMachine::new()
        .apply(
            &ticket(SupportStatus::Closed),
            &ReviewAction::Transition {
                to: support(SupportStatus::Pending),
            },
            &outsider,
            at(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn test_tables_are_independently_configurable() {
    // A forward-only support table leaves the deletion table untouched
    let pending = support(SupportStatus::Pending);
    let in_progress = support(SupportStatus::InProgress);
    let resolved = support(SupportStatus::Resolved);
    let closed = support(SupportStatus::Closed);
    let strict = TransitionTable::new(QueueKind::Support)
        .allow(pending, in_progress)
        .allow(in_progress, resolved)
        .allow(resolved, closed)
        .terminal(closed)
        .accepting_answers();
    let machine = ReviewMachine::new().with_table(strict);

    let err = machine
        .apply(
            &ticket(SupportStatus::Resolved),
            &ReviewAction::Transition { to: in_progress },
            &ReviewerIdentity::admin("admin-1"),
            at(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        machine.table(QueueKind::AccountDeletion),
        &TransitionTable::account_deletion()
    );
}
