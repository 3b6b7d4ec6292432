//! Several workers sharing one remote quota.
//!
//! The "remote service" is simulated in-process: it admits 5 requests per 10 seconds and
//! reports its quota like Discogs does. Run with `cargo run --example shared_quota`.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quota_pacer::quota_pacing::{
    CallContext, CallCoordinator, PacingSettings, QuotaState, http::HttpError,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

const LIMIT: i64 = 5;
const WINDOW: Duration = Duration::from_secs(10);

struct SimulatedApi {
    window: Mutex<(Instant, i64)>,
}

impl SimulatedApi {
    fn request(&self, quota: &QuotaState, worker: usize) -> Result<String, HttpError> {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        if window.0.elapsed() >= WINDOW {
            *window = (Instant::now(), 0);
        }

        let remaining = LIMIT - window.1;
        let result = if window.1 < LIMIT {
            window.1 += 1;
            Ok(format!("payload for worker {worker}"))
        } else {
            warn!(worker, "429 Too Many Requests");
            Err(HttpError::TooManyRequests)
        };
        quota.update(LIMIT, window.1, remaining);
        result
    }
}

#[tokio::main]
async fn main() -> Result<(), quota_pacer::Error> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let api = Arc::new(SimulatedApi {
        window: Mutex::new((Instant::now(), 0)),
    });
    let state = Arc::new(QuotaState::new());
    let settings = PacingSettings::builder()
        .minimum_delay(Duration::from_millis(500))
        .build();
    let coordinator = CallCoordinator::with_settings(Arc::clone(&state), settings);

    // Ctrl-C stops every worker that is still waiting for quota.
    let token = CancellationToken::new();
    let ctx = CallContext::background()
        .with_token(token.clone())
        .with_timeout(Duration::from_secs(60));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let start = Instant::now();
    let workers: Vec<_> = (0..12)
        .map(|worker| {
            let api = Arc::clone(&api);
            let coordinator = coordinator.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let quota = Arc::clone(coordinator.state());
                coordinator
                    .call(&ctx, || {
                        let result = api.request(&quota, worker);
                        async move { result }
                    })
                    .await
            })
        })
        .collect();

    for worker in workers {
        match worker.await? {
            Ok(payload) => info!(elapsed_ms = start.elapsed().as_millis() as u64, %payload, "Done"),
            Err(error) => warn!(%error, "Gave up"),
        }
    }

    let snapshot = state.get();
    info!(
        total = snapshot.total,
        used = snapshot.used,
        remaining = snapshot.remaining,
        "Final quota"
    );
    Ok(())
}
