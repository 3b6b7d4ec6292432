use std::sync::Arc;

use bon::bon;
use bytes::Bytes;
use http::{HeaderMap, Request as HttpRequest};
use tower::{ServiceBuilder, ServiceExt};

use super::reqwest_integration::{QuotaFeedService, QuotaHeaders};
use super::{CallContext, PacingSettings, QuotaPacing, QuotaPacingLayer, QuotaState};
use crate::Error as CrateError;

/// A `reqwest` client whose requests share one remote quota.
///
/// Every response feeds the shared [`QuotaState`]; every request is paced and, when
/// rejected with `429 Too Many Requests`, retried with exponential backoff. Clones share
/// the quota.
#[derive(Clone, Debug)]
pub struct QuotaPacedClient {
    service: QuotaPacing<QuotaFeedService>,
    default_headers: HeaderMap,
}

#[bon]
impl QuotaPacedClient {
    /// - `client`: the `reqwest::Client` to send with; a default client when unset.
    /// - `state`: quota shared with other clients of the same service; a new one when unset.
    /// - `default_headers`: added to every request that does not set them already,
    ///   e.g. `User-Agent` or an `Authorization` token.
    /// - `context`: cancellation applied to calls made with [`send`](Self::send).
    #[builder]
    pub fn new(
        client: Option<reqwest::Client>,
        state: Option<Arc<QuotaState>>,
        #[builder(default)] settings: PacingSettings,
        #[builder(default)] headers: QuotaHeaders,
        #[builder(default)] default_headers: HeaderMap,
        #[builder(default)] context: CallContext,
    ) -> Self {
        let state = state.unwrap_or_default();
        let feed =
            QuotaFeedService::with_headers(client.unwrap_or_default(), Arc::clone(&state), headers);
        let service = ServiceBuilder::new()
            .layer(QuotaPacingLayer::new(state, settings).with_context(context))
            .service(feed);

        Self {
            service,
            default_headers,
        }
    }

    pub fn state(&self) -> &Arc<QuotaState> {
        self.service.state()
    }

    /// Sends `request` under the client's own context.
    pub async fn send(&self, request: HttpRequest<Bytes>) -> Result<reqwest::Response, CrateError> {
        let request = self.prepare(request);
        self.service.clone().oneshot(request).await
    }

    /// Sends `request`, giving up on waiting for quota once `context` is interrupted.
    pub async fn send_with(
        &self,
        context: CallContext,
        request: HttpRequest<Bytes>,
    ) -> Result<reqwest::Response, CrateError> {
        let request = self.prepare(request);
        self.service.clone().with_context(context).oneshot(request).await
    }

    pub async fn get(&self, url: &str) -> Result<reqwest::Response, CrateError> {
        let request = HttpRequest::get(url).body(Bytes::new())?;
        self.send(request).await
    }

    fn prepare(&self, mut request: HttpRequest<Bytes>) -> HttpRequest<Bytes> {
        let headers = request.headers_mut();
        for (name, value) in &self.default_headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        request
    }
}
