use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{HeaderMap, HeaderName, Request as HttpRequest, StatusCode};
use tower::Service;

use super::http::{HttpError, status_error};
use super::state::QuotaState;

/// Response headers that carry the service's quota usage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuotaHeaders {
    pub total: HeaderName,
    pub used: HeaderName,
    pub remaining: HeaderName,
}

impl Default for QuotaHeaders {
    /// The Discogs API headers.
    fn default() -> Self {
        Self {
            total: HeaderName::from_static("x-discogs-ratelimit"),
            used: HeaderName::from_static("x-discogs-ratelimit-used"),
            remaining: HeaderName::from_static("x-discogs-ratelimit-remaining"),
        }
    }
}

impl QuotaHeaders {
    /// Reads `(total, used, remaining)`. A missing or malformed header reads as zero.
    pub fn read(&self, headers: &HeaderMap) -> (i64, i64, i64) {
        let value = |name: &HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0)
        };
        (
            value(&self.total),
            value(&self.used),
            value(&self.remaining),
        )
    }

    /// Feeds the quota reported by `response` into `state`.
    pub fn observe(&self, response: &reqwest::Response, state: &QuotaState) {
        let (total, used, remaining) = self.read(response.headers());
        state.update(total, used, remaining);
    }
}

/// A `tower::Service` wrapper for `reqwest::Client` that reports the quota headers of
/// every response to a shared [`QuotaState`].
///
/// Accepts `http::Request<Bytes>` so requests can be cloned for retries. Responses with
/// a non-success status become [`HttpError`]s after their quota has been recorded.
#[derive(Clone, Debug)]
pub struct QuotaFeedService {
    client: reqwest::Client,
    state: Arc<QuotaState>,
    headers: QuotaHeaders,
}

impl QuotaFeedService {
    pub fn new(client: reqwest::Client, state: Arc<QuotaState>) -> Self {
        Self::with_headers(client, state, QuotaHeaders::default())
    }

    pub fn with_headers(
        client: reqwest::Client,
        state: Arc<QuotaState>,
        headers: QuotaHeaders,
    ) -> Self {
        Self {
            client,
            state,
            headers,
        }
    }

    pub fn state(&self) -> &Arc<QuotaState> {
        &self.state
    }
}

impl Service<HttpRequest<Bytes>> for QuotaFeedService {
    type Response = reqwest::Response;
    type Error = HttpError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, http_request: HttpRequest<Bytes>) -> Self::Future {
        let request = match reqwest::Request::try_from(http_request) {
            Ok(request) => request,
            Err(error) => {
                let error = HttpError::InvalidRequest {
                    details: error.to_string(),
                };
                return Box::pin(async move { Err(error) });
            }
        };

        let client = self.client.clone();
        let state = Arc::clone(&self.state);
        let headers = self.headers.clone();

        Box::pin(async move {
            let response = client.execute(request).await.map_err(|error| {
                if error.is_timeout() {
                    warn!(%error, "Request timed out");
                    HttpError::Timeout
                } else {
                    error!(%error, "Transport error");
                    HttpError::Transport { source: error }
                }
            })?;

            headers.observe(&response, &state);
            check_response(response).await
        })
    }
}

/// Turns a response with a non-success status into an [`HttpError`].
pub async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, HttpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Could not read error body".to_string());

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        warn!(%status, error_body = %body, "Server error or rate limited");
    } else {
        error!(%status, error_body = %body, "Client error");
    }

    Err(status_error(status, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, headers: &[(&str, &str)], body: &'static str) -> reqwest::Response {
        let mut builder = http::Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        reqwest::Response::from(builder.body(body).unwrap())
    }

    #[test]
    fn reads_discogs_headers() {
        let mut map = HeaderMap::new();
        map.insert("x-discogs-ratelimit", "60".parse().unwrap());
        map.insert("x-discogs-ratelimit-used", "59".parse().unwrap());
        map.insert("x-discogs-ratelimit-remaining", " 1 ".parse().unwrap());
        assert_eq!(QuotaHeaders::default().read(&map), (60, 59, 1));
    }

    #[test]
    fn missing_or_malformed_headers_read_as_zero() {
        let mut map = HeaderMap::new();
        map.insert("x-discogs-ratelimit", "lots".parse().unwrap());
        map.insert("x-discogs-ratelimit-used", "3".parse().unwrap());
        assert_eq!(QuotaHeaders::default().read(&map), (0, 3, 0));
    }

    #[test]
    fn custom_header_names() {
        let headers = QuotaHeaders {
            total: HeaderName::from_static("x-ratelimit-limit"),
            used: HeaderName::from_static("x-ratelimit-used"),
            remaining: HeaderName::from_static("x-ratelimit-remaining"),
        };
        let mut map = HeaderMap::new();
        map.insert("x-ratelimit-limit", "100".parse().unwrap());
        map.insert("x-ratelimit-remaining", "40".parse().unwrap());
        assert_eq!(headers.read(&map), (100, 0, 40));
    }

    #[tokio::test]
    async fn rejected_response_still_feeds_quota() {
        let state = QuotaState::new();
        let rejected = response(
            429,
            &[
                ("x-discogs-ratelimit", "60"),
                ("x-discogs-ratelimit-used", "60"),
                ("x-discogs-ratelimit-remaining", "0"),
            ],
            "slow down",
        );

        QuotaHeaders::default().observe(&rejected, &state);
        let snapshot = state.get();
        assert_eq!((snapshot.total, snapshot.used, snapshot.remaining), (60, 60, 0));
        assert!(snapshot.observed_at.is_some());

        assert!(matches!(
            check_response(rejected).await,
            Err(HttpError::TooManyRequests)
        ));
    }

    #[tokio::test]
    async fn check_response_passes_success_and_keeps_body_of_failures() {
        let ok = check_response(response(200, &[], "{}")).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        match check_response(response(503, &[], "maintenance")).await {
            Err(HttpError::ServerError { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        assert!(matches!(
            check_response(response(401, &[], "")).await,
            Err(HttpError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn invalid_uri_is_rejected_before_sending() {
        let state = Arc::new(QuotaState::new());
        let mut service = QuotaFeedService::new(reqwest::Client::new(), Arc::clone(&state));

        let request = HttpRequest::get("/relative/path").body(Bytes::new()).unwrap();
        let result = service.call(request).await;

        assert!(matches!(result, Err(HttpError::InvalidRequest { .. })));
        assert_eq!(state.get().observed_at, None);
    }
}
