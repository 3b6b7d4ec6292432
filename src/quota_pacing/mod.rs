//! Pace and retry calls against a remote service's shared quota.

mod backoff;
mod context;
mod coordinator;
pub mod layer;
mod state;
pub mod service;

pub mod client;
pub mod http;
pub mod internal_event;
pub mod reqwest_integration;

use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Deserializer};

pub use backoff::DoublingBackoff;
pub use context::{CallContext, Interrupted};
pub use coordinator::{CallCoordinator, QuotaExhaustion};
pub use layer::QuotaPacingLayer;
pub use service::QuotaPacing;
pub use state::{QuotaSnapshot, QuotaState};

fn instant_now() -> tokio::time::Instant {
    tokio::time::Instant::now()
}

/// Tuning of the pacing loop run by [`CallCoordinator`].
///
/// The defaults encode empirical behavior of the Discogs API: it reports the quota as it
/// was *before* the request, and it forgets a rate-limited client within a few seconds.
/// Other services may need different values.
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `minimum_delay` | 2.5s | First pause; doubled after every pause of the same call |
/// | `freshness_window` | 10s | How long a snapshot is trusted for preventive pauses |
/// | `max_delay` | none | Optional clamp on a single pause |
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use quota_pacer::quota_pacing::PacingSettings;
///
/// let settings = PacingSettings::builder()
///     .minimum_delay(Duration::from_millis(500))
///     .freshness_window(Duration::from_secs(5))
///     .build();
/// assert_eq!(settings.max_delay(), None);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Builder, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PacingSettings {
    /// Length of the first pause of a call. Every pause doubles it for the next one.
    ///
    /// **Default**: 2.5 seconds
    #[builder(default = default_minimum_delay())]
    #[serde(rename = "minimum_delay_ms", deserialize_with = "duration_from_millis")]
    pub(super) minimum_delay: Duration,

    /// Age below which a snapshot is considered fresh enough to justify a preventive
    /// pause when it reports `remaining <= 1`. Older snapshots are ignored.
    ///
    /// **Default**: 10 seconds
    #[builder(default = default_freshness_window())]
    #[serde(rename = "freshness_window_ms", deserialize_with = "duration_from_millis")]
    pub(super) freshness_window: Duration,

    /// Upper bound for a single pause. Left unset, the delay grows without bound and
    /// only the caller's deadline limits the total wait.
    #[serde(rename = "max_delay_ms", deserialize_with = "optional_duration_from_millis")]
    pub(super) max_delay: Option<Duration>,
}

const fn default_minimum_delay() -> Duration {
    Duration::from_millis(2500)
}

const fn default_freshness_window() -> Duration {
    Duration::from_secs(10)
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            minimum_delay: default_minimum_delay(),
            freshness_window: default_freshness_window(),
            max_delay: None,
        }
    }
}

impl PacingSettings {
    pub fn minimum_delay(&self) -> Duration {
        self.minimum_delay
    }

    pub fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// The delay sequence a single call walks through.
    pub fn backoff(&self) -> DoublingBackoff {
        let backoff = DoublingBackoff::new(self.minimum_delay);
        match self.max_delay {
            Some(max) => backoff.max_delay(max),
            None => backoff,
        }
    }
}

fn duration_from_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

fn optional_duration_from_millis<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}
