//! Per-queue transition tables.
//!
//! Each queue carries its own table so the two lifecycles stay independently
//! configurable: the support table permits moving a ticket backwards, the
//! account-deletion table is strictly forward-only.

use super::effect::EffectKind;
use crate::record::{DeletionStatus, RecordStatus, SupportStatus};
use crate::types::QueueKind;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    kind: QueueKind,
    initial: RecordStatus,
    terminal: BTreeSet<RecordStatus>,
    edges: BTreeSet<(RecordStatus, RecordStatus)>,
    on_enter: BTreeMap<RecordStatus, Vec<EffectKind>>,
    accepts_answers: bool,
    review_outcomes: BTreeSet<RecordStatus>,
}

impl TransitionTable {
    /// Empty table for `kind`: only the initial status, no edges
    pub fn new(kind: QueueKind) -> Self {
        Self {
            kind,
            initial: RecordStatus::initial(kind),
            terminal: BTreeSet::new(),
            edges: BTreeSet::new(),
            on_enter: BTreeMap::new(),
            accepts_answers: false,
            review_outcomes: BTreeSet::new(),
        }
    }

    /// Support tickets: any non-terminal status may move to any other status,
    /// including backwards (e.g. RESOLVED -> IN_PROGRESS); CLOSED is terminal.
    pub fn support() -> Self {
        let closed = RecordStatus::Support(SupportStatus::Closed);
        let statuses = RecordStatus::all(QueueKind::Support);

        let mut table = Self::new(QueueKind::Support).terminal(closed).accepting_answers();
        for from in statuses.iter().copied().filter(|s| *s != closed) {
            for to in statuses.iter().copied().filter(|s| *s != from) {
                table = table.allow(from, to);
            }
        }
        table
    }

    /// Account deletion: pending -> approved | rejected, both terminal.
    /// Approval triggers removal of the subject entity.
    pub fn account_deletion() -> Self {
        let pending = RecordStatus::AccountDeletion(DeletionStatus::Pending);
        let approved = RecordStatus::AccountDeletion(DeletionStatus::Approved);
        let rejected = RecordStatus::AccountDeletion(DeletionStatus::Rejected);

        Self::new(QueueKind::AccountDeletion)
            .allow(pending, approved)
            .allow(pending, rejected)
            .terminal(approved)
            .terminal(rejected)
            .review_outcome(approved)
            .review_outcome(rejected)
            .on_enter(approved, EffectKind::DeleteSubject)
    }

    pub fn for_kind(kind: QueueKind) -> Self {
        match kind {
            QueueKind::Support => Self::support(),
            QueueKind::AccountDeletion => Self::account_deletion(),
        }
    }

    pub fn allow(mut self, from: RecordStatus, to: RecordStatus) -> Self {
        self.edges.insert((from, to));
        self
    }

    pub fn terminal(mut self, status: RecordStatus) -> Self {
        self.terminal.insert(status);
        self
    }

    pub fn on_enter(mut self, status: RecordStatus, effect: EffectKind) -> Self {
        self.on_enter.entry(status).or_default().push(effect);
        self
    }

    pub fn accepting_answers(mut self) -> Self {
        self.accepts_answers = true;
        self
    }

    /// Mark `status` as reachable only through the review action
    pub fn review_outcome(mut self, status: RecordStatus) -> Self {
        self.review_outcomes.insert(status);
        self
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn initial(&self) -> RecordStatus {
        self.initial
    }

    pub fn is_terminal(&self, status: RecordStatus) -> bool {
        self.terminal.contains(&status)
    }

    pub fn permits(&self, from: RecordStatus, to: RecordStatus) -> bool {
        !self.is_terminal(from) && self.edges.contains(&(from, to))
    }

    pub fn accepts_answers(&self) -> bool {
        self.accepts_answers
    }

    pub fn has_review_action(&self) -> bool {
        !self.review_outcomes.is_empty()
    }

    pub fn is_review_outcome(&self, status: RecordStatus) -> bool {
        self.review_outcomes.contains(&status)
    }

    pub fn effects_on_enter(&self, status: RecordStatus) -> &[EffectKind] {
        self.on_enter.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when no status can ever be re-entered once left (the edge graph is acyclic).
    pub fn is_monotonic(&self) -> bool {
        let mut finished = BTreeSet::new();
        let mut on_path = BTreeSet::new();
        let nodes: BTreeSet<RecordStatus> = self
            .edges
            .iter()
            .flat_map(|(from, to)| [*from, *to])
            .collect();
        nodes
            .into_iter()
            .all(|node| !self.reaches_cycle(node, &mut on_path, &mut finished))
    }

    fn reaches_cycle(
        &self,
        node: RecordStatus,
        on_path: &mut BTreeSet<RecordStatus>,
        finished: &mut BTreeSet<RecordStatus>,
    ) -> bool {
        if finished.contains(&node) {
            return false;
        }
        if !on_path.insert(node) {
            return true;
        }
        let cyclic = self
            .edges
            .iter()
            .filter(|(from, _)| *from == node)
            .any(|(_, to)| self.reaches_cycle(*to, on_path, finished));
        on_path.remove(&node);
        finished.insert(node);
        cyclic
    }
}
