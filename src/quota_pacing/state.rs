use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use tokio::time::Instant;

use super::instant_now;
use super::internal_event::{InternalEvent, QuotaObserved};

/// The last quota usage reported by the remote service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QuotaSnapshot {
    /// Requests allowed per window.
    pub total: i64,
    /// Requests consumed in the current window.
    pub used: i64,
    /// Requests left in the current window.
    pub remaining: i64,
    /// When the snapshot was recorded; `None` until the first update.
    pub observed_at: Option<Instant>,
}

impl QuotaSnapshot {
    /// Time elapsed since the snapshot was recorded.
    pub fn age(&self) -> Option<Duration> {
        self.observed_at.map(|at| instant_now().saturating_duration_since(at))
    }

    pub fn is_fresh(&self, window: Duration) -> bool {
        self.age().is_some_and(|age| age < window)
    }

    /// Whether the next request is likely to be rejected.
    ///
    /// The service reports the count from before the request, so `remaining == 1`
    /// already means the window is spent.
    pub fn requires_pause(&self, freshness_window: Duration) -> bool {
        self.is_fresh(freshness_window) && self.remaining <= 1
    }
}

/// Mutex-guarded record of the latest [`QuotaSnapshot`].
///
/// Shared through an `Arc` by every caller that targets the same remote quota. Updates
/// and reads swap whole snapshots, so a reader never sees a torn one.
#[derive(Debug, Default)]
pub struct QuotaState {
    snapshot: Mutex<QuotaSnapshot>,
}

impl QuotaState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the quota reported by a response, stamped with the current time.
    ///
    /// Values are stored as given; the service is trusted.
    pub fn update(&self, total: i64, used: i64, remaining: i64) {
        let snapshot = QuotaSnapshot {
            total,
            used,
            remaining,
            observed_at: Some(instant_now()),
        };
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;

        trace!(message = "Quota updated.", total, used, remaining);
        QuotaObserved { total, used, remaining }.emit();
    }

    /// The most recent snapshot.
    pub fn get(&self) -> QuotaSnapshot {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn starts_empty() {
        let state = QuotaState::new();
        assert_eq!(state.get(), QuotaSnapshot::default());
        assert!(!state.get().is_fresh(Duration::from_secs(10)));
        assert!(!state.get().requires_pause(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn update_then_get() {
        let state = QuotaState::new();
        for (total, used, remaining) in [(10, 6, 4), (10, 7, 3)] {
            state.update(total, used, remaining);
            let snapshot = state.get();
            assert_eq!(
                (snapshot.total, snapshot.used, snapshot.remaining),
                (total, used, remaining)
            );
            let age = snapshot.age().unwrap();
            assert!(age < Duration::from_secs(1), "unexpected age {age:?}");
        }
    }

    #[test]
    fn accepts_inconsistent_values() {
        let state = QuotaState::new();
        state.update(-1, 50, -7);
        let snapshot = state.get();
        assert_eq!((snapshot.total, snapshot.used, snapshot.remaining), (-1, 50, -7));
        assert!(snapshot.requires_pause(Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_goes_stale() {
        let state = QuotaState::new();
        state.update(10, 10, 0);
        assert!(state.get().requires_pause(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!state.get().is_fresh(Duration::from_secs(10)));
        assert!(!state.get().requires_pause(Duration::from_secs(10)));
    }

    #[test]
    fn remaining_threshold() {
        let state = QuotaState::new();
        let window = Duration::from_secs(10);
        for (remaining, pause) in [(2, false), (1, true), (0, true)] {
            state.update(10, 10 - remaining, remaining);
            assert_eq!(state.get().requires_pause(window), pause, "remaining={remaining}");
        }
    }

    #[test]
    fn concurrent_updates_are_never_torn() {
        let state = Arc::new(QuotaState::new());
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for n in 0..1_000 {
                        let used = i * 1_000 + n;
                        state.update(used * 3, used, used * 2);
                    }
                })
            })
            .collect();

        for _ in 0..1_000 {
            let snapshot = state.get();
            assert_eq!(snapshot.total, snapshot.used * 3);
            assert_eq!(snapshot.remaining, snapshot.used * 2);
        }
        for writer in writers {
            writer.join().unwrap();
        }
    }
}
