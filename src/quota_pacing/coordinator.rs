use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;

use super::context::{CallContext, Interrupted};
use super::http::HttpError;
use super::internal_event::{InternalEvent, PauseReason, PausingCall, QuotaExhausted};
use super::state::QuotaState;
use super::PacingSettings;
use crate::Error as CrateError;

/// Recognizes the error a remote service returns once the quota window is spent.
pub trait QuotaExhaustion {
    fn is_quota_exhausted(&self) -> bool;
}

impl QuotaExhaustion for HttpError {
    fn is_quota_exhausted(&self) -> bool {
        matches!(self, HttpError::TooManyRequests)
    }
}

impl QuotaExhaustion for CrateError {
    fn is_quota_exhausted(&self) -> bool {
        self.downcast_ref::<HttpError>()
            .is_some_and(HttpError::is_quota_exhausted)
    }
}

/// Runs units of work against a shared [`QuotaState`], pausing before attempts that
/// are likely to be rejected and retrying attempts that were.
///
/// The coordinator itself holds no per-call state; clones and coordinators built over
/// the same `Arc<QuotaState>` share one budget.
#[derive(Clone, Debug)]
pub struct CallCoordinator {
    state: Arc<QuotaState>,
    settings: PacingSettings,
}

impl CallCoordinator {
    pub fn new(state: Arc<QuotaState>) -> Self {
        Self::with_settings(state, PacingSettings::default())
    }

    pub fn with_settings(state: Arc<QuotaState>, settings: PacingSettings) -> Self {
        Self { state, settings }
    }

    pub fn state(&self) -> &Arc<QuotaState> {
        &self.state
    }

    pub fn settings(&self) -> &PacingSettings {
        &self.settings
    }

    /// Invokes `work` once the quota looks available and repeats it, with exponential
    /// backoff, for as long as it fails with a quota-exhausted error.
    ///
    /// Any other outcome of `work` is returned unchanged after that attempt. If `ctx` is
    /// interrupted during a pause the interruption is returned and `work` is not invoked
    /// again; an attempt already in flight is not aborted.
    pub async fn call<T, E, F, Fut>(&self, ctx: &CallContext, mut work: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: QuotaExhaustion + From<Interrupted>,
    {
        let mut delays = self.settings.backoff();
        let mut attempt = 0;

        loop {
            let reason = if attempt > 0 {
                Some(PauseReason::Reactive)
            } else if self
                .state
                .get()
                .requires_pause(self.settings.freshness_window)
            {
                Some(PauseReason::Preventive)
            } else {
                None
            };

            if let Some(reason) = reason {
                // The sequence is unbounded; `next` never yields `None`.
                let delay = delays.next().unwrap_or(Duration::MAX);
                PausingCall { reason, delay }.emit();
                pause(ctx, delay).await?;
            }

            attempt += 1;
            match work().await {
                Err(error) if error.is_quota_exhausted() => {
                    QuotaExhausted { attempt }.emit();
                }
                result => return result,
            }
        }
    }
}

/// Sleeps for `delay` unless `ctx` is interrupted first.
async fn pause(ctx: &CallContext, delay: Duration) -> Result<(), Interrupted> {
    if let Some(interrupted) = ctx.err() {
        return Err(interrupted);
    }

    tokio::select! {
        biased;
        interrupted = ctx.done() => {
            trace!(message = "Pause interrupted.", reason = %interrupted);
            Err(interrupted)
        }
        _ = sleep(delay) => Ok(()),
    }
}
