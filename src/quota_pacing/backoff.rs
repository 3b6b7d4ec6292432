use std::time::Duration;

/// A retry strategy driven by exponential back-off with base 2.
///
/// Yields `initial`, `initial * 2`, `initial * 4`, ... The sequence never ends; the
/// multiplication saturates at [`Duration::MAX`] instead of overflowing.
#[derive(Debug, Clone)]
pub struct DoublingBackoff {
    current: Duration,
    max_delay: Option<Duration>,
}

impl DoublingBackoff {
    pub const fn new(initial: Duration) -> DoublingBackoff {
        DoublingBackoff {
            current: initial,
            max_delay: None,
        }
    }

    /// Apply a maximum delay. No yielded delay will be longer than this `Duration`.
    pub const fn max_delay(mut self, duration: Duration) -> DoublingBackoff {
        self.max_delay = Some(duration);
        self
    }
}

impl Iterator for DoublingBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let duration = self.current;
        self.current = duration.checked_mul(2).unwrap_or(Duration::MAX);

        if let Some(max_delay) = self.max_delay {
            if duration > max_delay {
                return Some(max_delay);
            }
        }

        Some(duration)
    }
}
