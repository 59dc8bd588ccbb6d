//! Index scheduling: when to run a full or a partial pass.

pub mod signal;
pub mod state;

pub use signal::{Admission, ChangeSignal, DiscardReason, PassKind};
pub use state::{IndexScheduler, PassOutcome, PassPlan, SchedulerState};
