//! Metrics and log events emitted while pacing calls.

mod quota_pacing;

pub use quota_pacing::{PauseReason, PausingCall, QuotaExhausted, QuotaObserved};

/// An event that is recorded as metrics and, where useful, as a log line.
pub trait InternalEvent: Sized {
    fn emit(self);
}
