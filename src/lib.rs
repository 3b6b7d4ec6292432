//! Shared rate-limit quota tracking with adaptive pacing for HTTP API clients
//!
//! Many remote APIs report their per-minute budget in response headers (total, used,
//! remaining) and answer `429 Too Many Requests` once it runs out. This crate lets any
//! number of concurrent callers share one view of that budget and wraps each call in a
//! pacing/retry loop, so callers never implement backoff themselves.
//!
//! # Algorithm Overview
//!
//! Before every attempt the [`CallCoordinator`](quota_pacing::CallCoordinator) reads the
//! last observed [`QuotaSnapshot`](quota_pacing::QuotaSnapshot):
//! 1. **Preventive pause**: when the snapshot is fresh (default: younger than 10s) and
//!    reports `remaining <= 1`, wait before sending.
//! 2. **Reactive retry**: when the work fails with a quota-exhausted error, wait and try
//!    again, indefinitely, until success, another error, or cancellation.
//!
//! Both share one delay that starts at `minimum_delay` (default: 2.5s) and doubles after
//! every pause.
//!
//! # Basic Usage
//! ```no_run
//! use quota_pacer::quota_pacing::{client::QuotaPacedClient, PacingSettings};
//!
//! # async fn run() -> Result<(), quota_pacer::Error> {
//! let client = QuotaPacedClient::builder()
//!     .client(reqwest::Client::new())
//!     .settings(PacingSettings::default())
//!     .build();
//!
//! let request = http::Request::get("https://api.discogs.com/artists/1")
//!     .body(bytes::Bytes::new())?;
//! let response = client.send(request).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```
//!
//! # Metrics
//! Emits metrics via the `InternalEvent` trait
pub mod quota_pacing;
#[cfg(test)]
pub mod test_util;

#[macro_use]
extern crate tracing;

pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
