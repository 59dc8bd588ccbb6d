//! Change notifications the host feeds into the engine.

use chrono::{DateTime, Utc};

use crate::store::NotePath;

/// A change notification, translated by the host from its own event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSignal {
    /// The store and query evaluator finished their initial load.
    StoreReady,
    /// The query evaluator finished re-indexing `note`.
    Resolved { note: NotePath, timestamp: DateTime<Utc> },
    /// Front matter, tags or inline fields of `note` changed.
    MetadataChanged { note: NotePath, timestamp: DateTime<Utc> },
    Renamed { from: NotePath, to: NotePath, timestamp: DateTime<Utc> },
    Deleted { note: NotePath, timestamp: DateTime<Utc> },
}

impl ChangeSignal {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::StoreReady => None,
            Self::Resolved { timestamp, .. }
            | Self::MetadataChanged { timestamp, .. }
            | Self::Renamed { timestamp, .. }
            | Self::Deleted { timestamp, .. } => Some(*timestamp),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::StoreReady => "store-ready",
            Self::Resolved { .. } => "resolved",
            Self::MetadataChanged { .. } => "metadata-changed",
            Self::Renamed { .. } => "renamed",
            Self::Deleted { .. } => "deleted",
        }
    }
}

/// Why a signal was dropped without scheduling work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Arrived before the store reported ready.
    NotReady,
    /// The note's timestamp predates the scheduler's startup.
    PredatesStartup,
    /// A `Resolved` notification with no new data behind it.
    NoRevisionChange,
    /// A second `StoreReady`.
    AlreadyReady,
}

/// Kind of pass a signal was folded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Full,
    Partial,
}

/// What the scheduler did with a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Queued(PassKind),
    Discarded(DiscardReason),
}
