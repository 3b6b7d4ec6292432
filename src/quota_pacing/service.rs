use std::{
    sync::Arc,
    task::{Context, Poll},
};

use futures::future::BoxFuture;
use tower::{Service, ServiceExt};

use super::{CallContext, CallCoordinator, QuotaState};
use crate::Error as CrateError;

/// A service that paces and retries its requests through a [`CallCoordinator`].
///
/// Every attempt runs on a fresh clone of the inner service with a clone of the
/// request. Inner errors are boxed into the crate error; a boxed
/// [`HttpError::TooManyRequests`](super::http::HttpError::TooManyRequests) triggers a
/// retry, anything else is returned as is.
#[derive(Clone, Debug)]
pub struct QuotaPacing<S> {
    inner: S,
    coordinator: CallCoordinator,
    context: CallContext,
}

impl<S> QuotaPacing<S> {
    pub fn new(inner: S, coordinator: CallCoordinator) -> Self {
        Self {
            inner,
            coordinator,
            context: CallContext::background(),
        }
    }

    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }

    pub fn state(&self) -> &Arc<QuotaState> {
        self.coordinator.state()
    }
}

impl<S, Request> Service<Request> for QuotaPacing<S>
where
    S: Service<Request> + Clone + Send + 'static,
    S::Error: Into<CrateError>,
    S::Future: Send,
    S::Response: Send,
    Request: Clone + Send + 'static,
{
    type Response = S::Response;
    type Error = CrateError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    // Readiness is checked per attempt on the clone that serves it.
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let inner = self.inner.clone();
        let coordinator = self.coordinator.clone();
        let context = self.context.clone();

        Box::pin(async move {
            coordinator
                .call(&context, move || {
                    let service = inner.clone();
                    let request = request.clone();
                    async move { service.oneshot(request).await.map_err(Into::<CrateError>::into) }
                })
                .await
        })
    }
}
