use std::time::Duration;

use snafu::Snafu;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use super::instant_now;

/// Why a caller stopped waiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Interrupted {
    #[snafu(display("call canceled"))]
    Canceled,

    #[snafu(display("call deadline exceeded"))]
    DeadlineExceeded,
}

/// Cancellation and deadline carried by a call.
///
/// Cloning shares the cancellation token, so canceling any clone interrupts every
/// call that holds one.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never interrupted.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Keeps the earlier of the current and the given deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// A timeout too large to represent as an instant leaves the deadline unchanged.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match instant_now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The interruption that already happened, if any.
    pub fn err(&self) -> Option<Interrupted> {
        if self.token.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Some(Interrupted::Canceled);
        }
        match self.deadline {
            Some(deadline) if deadline <= instant_now() => Some(Interrupted::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is canceled or its deadline passes. Pending forever for
    /// a background context.
    pub async fn done(&self) -> Interrupted {
        let canceled = async {
            match &self.token {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = canceled => Interrupted::Canceled,
            _ = expired => Interrupted::DeadlineExceeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, assert_ready_eq, task};

    use super::*;

    #[test]
    fn background_is_never_done() {
        let ctx = CallContext::background();
        assert_eq!(ctx.err(), None);
        assert_eq!(ctx.deadline(), None);
    }

    #[tokio::test]
    async fn cancel_wakes_done() {
        let token = CancellationToken::new();
        let ctx = CallContext::background().with_token(token.clone());

        let mut done = task::spawn(ctx.done());
        assert_pending!(done.poll());

        token.cancel();
        assert!(done.is_woken());
        assert_ready_eq!(done.poll(), Interrupted::Canceled);
        assert_eq!(ctx.err(), Some(Interrupted::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = CallContext::background().with_timeout(Duration::from_secs(5));
        assert_eq!(ctx.err(), None);

        let mut done = task::spawn(ctx.done());
        assert_pending!(done.poll());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_ready_eq!(done.poll(), Interrupted::DeadlineExceeded);
        assert_eq!(ctx.err(), Some(Interrupted::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_deadline_wins() {
        let now = Instant::now();
        let ctx = CallContext::background()
            .with_deadline(now + Duration::from_secs(3))
            .with_deadline(now + Duration::from_secs(9));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_timeout_keeps_deadline() {
        let ctx = CallContext::background().with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline(), None);
        assert_eq!(ctx.err(), None);

        let ctx = CallContext::background()
            .with_timeout(Duration::from_secs(5))
            .with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline(), Some(Instant::now() + Duration::from_secs(5)));
    }

    #[test]
    fn cancellation_beats_deadline() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = CallContext::background()
            .with_token(token)
            .with_deadline(Instant::now());
        assert_eq!(ctx.err(), Some(Interrupted::Canceled));
    }
}
