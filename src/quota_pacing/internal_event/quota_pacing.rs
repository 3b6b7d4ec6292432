use std::time::Duration;

use metrics::{counter, gauge, histogram};

use super::InternalEvent;

/// Why a call waits before its next attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PauseReason {
    /// A fresh snapshot says the window is spent.
    Preventive,
    /// The previous attempt was rejected for exceeding the quota.
    Reactive,
}

impl PauseReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PauseReason::Preventive => "preventive",
            PauseReason::Reactive => "reactive",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct QuotaObserved {
    pub total: i64,
    pub used: i64,
    pub remaining: i64,
}

impl InternalEvent for QuotaObserved {
    fn emit(self) {
        gauge!("quota_pacer_total").set(self.total as f64);
        gauge!("quota_pacer_used").set(self.used as f64);
        gauge!("quota_pacer_remaining").set(self.remaining as f64);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PausingCall {
    pub reason: PauseReason,
    pub delay: Duration,
}

impl InternalEvent for PausingCall {
    fn emit(self) {
        debug!(
            target: "quota_pacer::pacing",
            reason = self.reason.as_str(),
            delay_ms = self.delay.as_millis() as u64,
            "Pausing before next attempt."
        );
        counter!("quota_pacer_pauses_total", "reason" => self.reason.as_str()).increment(1);
        histogram!("quota_pacer_pause_seconds").record(self.delay);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct QuotaExhausted {
    pub attempt: usize,
}

impl InternalEvent for QuotaExhausted {
    fn emit(self) {
        debug!(
            target: "quota_pacer::pacing",
            attempt = self.attempt,
            "Quota exhausted; retrying."
        );
        counter!("quota_pacer_quota_exhausted_total").increment(1);
    }
}
