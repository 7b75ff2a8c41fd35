//! Docket: review-queue engine for moderation inboxes
//!
//! Keeps support-ticket and account-deletion queues fresh by polling a collaborator
//! store, reconciles heterogeneous wire shapes into one canonical record, gates every
//! queue behind a role/scope access policy, and advances records through per-queue
//! review state machines with an append-only audit trail.

pub mod access;
pub mod canonical;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod record;
pub mod refresh;
pub mod review;
pub mod store;
pub mod types;
pub mod view;

pub use access::{can_access, ReviewerIdentity, ReviewerRole};
pub use canonical::{canonicalize, to_raw};
pub use engine::{DispatchOutcome, QueueEngine};
pub use error::{ErrorKind, QueueError, StoreError};
pub use record::{AuditNote, CanonicalRecord, RecordStatus};
pub use refresh::{RefreshController, RefreshOutcome, RefreshState, RefreshTrigger, Snapshot};
pub use review::{ReviewAction, ReviewMachine, SideEffect, TransitionTable};
pub use store::{FetchTicket, ListQuery, QueueStore};
pub use types::{QueueKind, ScopeKey};
