//! The scheduling state machine. Pure: no I/O, no clock reads.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::signal::{Admission, ChangeSignal, DiscardReason, PassKind};
use crate::store::NotePath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    FullPass,
    PartialPass,
}

/// Work to do in the next pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassPlan {
    Full,
    Partial { changed: BTreeSet<NotePath>, deleted: BTreeSet<NotePath> },
}

impl PassPlan {
    pub fn kind(&self) -> PassKind {
        match self {
            Self::Full => PassKind::Full,
            Self::Partial { .. } => PassKind::Partial,
        }
    }

    /// Fold `other` into this plan. A full plan absorbs everything.
    fn merge(&mut self, other: PassPlan) {
        match (&mut *self, other) {
            (Self::Full, _) => {}
            (this, Self::Full) => *this = Self::Full,
            (
                Self::Partial { changed, deleted },
                Self::Partial { changed: more_changed, deleted: more_deleted },
            ) => {
                for note in more_deleted {
                    changed.remove(&note);
                    deleted.insert(note);
                }
                for note in more_changed {
                    deleted.remove(&note);
                    changed.insert(note);
                }
            }
        }
    }
}

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Completed,
    /// A partial pass stopped early because a full pass was requested.
    Superseded,
    /// The pass could not run; its plan stays queued.
    Failed,
}

/// Decides when a full or partial pass is needed.
///
/// Signals are admitted with [`IndexScheduler::admit`]; the owner drives
/// passes with [`IndexScheduler::begin_pass`] and
/// [`IndexScheduler::finish_pass`]. Signals arriving while a pass runs are
/// queued, never interleaved.
#[derive(Debug, Clone)]
pub struct IndexScheduler {
    started_at: DateTime<Utc>,
    templates_dir: String,
    state: SchedulerState,
    ready: bool,
    pending: Option<PassPlan>,
    in_flight: Option<PassPlan>,
    revision_at_start: u64,
    last_revision: Option<u64>,
}

impl IndexScheduler {
    pub fn new(started_at: DateTime<Utc>, templates_dir: impl Into<String>) -> Self {
        Self {
            started_at,
            templates_dir: templates_dir.into(),
            state: SchedulerState::Idle,
            ready: false,
            pending: None,
            in_flight: None,
            revision_at_start: 0,
            last_revision: None,
        }
    }

    /// Admit a change signal. `revision` is the store's current revision.
    pub fn admit(&mut self, signal: &ChangeSignal, revision: u64) -> Admission {
        let admission = self.classify(signal, revision);
        match admission {
            Admission::Discarded(reason) => {
                tracing::trace!(signal = signal.kind(), ?reason, "Discarded signal");
            }
            Admission::Queued(kind) => {
                tracing::debug!(signal = signal.kind(), ?kind, "Queued pass");
            }
        }
        admission
    }

    fn classify(&mut self, signal: &ChangeSignal, revision: u64) -> Admission {
        if let ChangeSignal::StoreReady = signal {
            if self.ready {
                return Admission::Discarded(DiscardReason::AlreadyReady);
            }
            self.ready = true;
            return Admission::Queued(self.enqueue(PassPlan::Full));
        }
        if !self.ready {
            return Admission::Discarded(DiscardReason::NotReady);
        }
        if signal.timestamp().is_some_and(|t| t < self.started_at) {
            return Admission::Discarded(DiscardReason::PredatesStartup);
        }

        let plan = match signal {
            ChangeSignal::StoreReady => PassPlan::Full,
            ChangeSignal::Resolved { note, .. } => {
                if self.last_revision == Some(revision) {
                    return Admission::Discarded(DiscardReason::NoRevisionChange);
                }
                self.plan_for_change(note)
            }
            ChangeSignal::MetadataChanged { note, .. } => self.plan_for_change(note),
            ChangeSignal::Deleted { note, .. } => {
                if self.is_template(note) {
                    PassPlan::Full
                } else {
                    partial([], [note.clone()])
                }
            }
            ChangeSignal::Renamed { from, to, .. } => {
                if self.is_template(from) || self.is_template(to) {
                    PassPlan::Full
                } else {
                    partial([to.clone()], [from.clone()])
                }
            }
        };
        Admission::Queued(self.enqueue(plan))
    }

    /// Queue a full pass regardless of readiness (explicit request).
    pub fn request_full(&mut self) -> PassKind {
        self.enqueue(PassPlan::Full)
    }

    fn plan_for_change(&self, note: &NotePath) -> PassPlan {
        if self.is_template(note) { PassPlan::Full } else { partial([note.clone()], []) }
    }

    fn is_template(&self, note: &NotePath) -> bool {
        note.is_inside(&self.templates_dir)
    }

    fn enqueue(&mut self, plan: PassPlan) -> PassKind {
        match &mut self.pending {
            Some(pending) => pending.merge(plan),
            None => self.pending = Some(plan),
        }
        self.pending.as_ref().map(PassPlan::kind).unwrap_or(PassKind::Full)
    }

    /// Start the next pass, if one is queued and none is running.
    pub fn begin_pass(&mut self, revision: u64) -> Option<PassPlan> {
        if self.state != SchedulerState::Idle {
            return None;
        }
        let plan = self.pending.take()?;
        self.state = match plan {
            PassPlan::Full => SchedulerState::FullPass,
            PassPlan::Partial { .. } => SchedulerState::PartialPass,
        };
        self.revision_at_start = revision;
        self.in_flight = Some(plan.clone());
        Some(plan)
    }

    /// Whether the running partial pass should stop for a queued full pass.
    pub fn upgrade_requested(&self) -> bool {
        self.state == SchedulerState::PartialPass && matches!(self.pending, Some(PassPlan::Full))
    }

    /// End the running pass. `revision` is the store's revision now.
    pub fn finish_pass(&mut self, outcome: PassOutcome, revision: u64) {
        let plan = self.in_flight.take();
        self.state = SchedulerState::Idle;

        match outcome {
            PassOutcome::Failed => {
                // Signals admitted during the pass are newer than the failed plan.
                if let Some(plan) = plan {
                    let newer = self.pending.replace(plan);
                    if let Some(newer) = newer {
                        self.enqueue(newer);
                    }
                }
            }
            PassOutcome::Superseded => {}
            PassOutcome::Completed => {
                if revision != self.revision_at_start && self.pending.is_none() {
                    tracing::debug!(
                        before = self.revision_at_start,
                        after = revision,
                        "Store changed during pass, queueing full pass"
                    );
                    self.pending = Some(PassPlan::Full);
                }
                self.last_revision = Some(revision);
            }
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn pending(&self) -> Option<&PassPlan> {
        self.pending.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

fn partial<const C: usize, const D: usize>(changed: [NotePath; C], deleted: [NotePath; D]) -> PassPlan {
    PassPlan::Partial { changed: changed.into_iter().collect(), deleted: deleted.into_iter().collect() }
}
