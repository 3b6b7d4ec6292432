use std::sync::Arc;

use tower::Layer;

use super::{CallContext, CallCoordinator, PacingSettings, QuotaPacing, QuotaState};

/// Enforces a shared remote quota on the underlying service.
#[derive(Clone, Debug)]
pub struct QuotaPacingLayer {
    coordinator: CallCoordinator,
    context: CallContext,
}

impl QuotaPacingLayer {
    pub fn new(state: Arc<QuotaState>, settings: PacingSettings) -> Self {
        Self::from_coordinator(CallCoordinator::with_settings(state, settings))
    }

    pub fn from_coordinator(coordinator: CallCoordinator) -> Self {
        Self {
            coordinator,
            context: CallContext::background(),
        }
    }

    /// Binds every call made through the produced services to `context`.
    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }
}

impl<S> Layer<S> for QuotaPacingLayer {
    type Service = QuotaPacing<S>;

    fn layer(&self, service: S) -> Self::Service {
        QuotaPacing::new(service, self.coordinator.clone()).with_context(self.context.clone())
    }
}
