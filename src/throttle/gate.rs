//! Admission gate trait for abstracting limited and unlimited call paths.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::trace;

use super::limiter::Limiter;

/// Something that decides when a call may start.
///
/// This trait lets callers hold either a real `Limiter` or the no-op
/// `Unlimited` gate behind the same type, e.g. when throttling is switched
/// off by configuration.
#[async_trait]
pub trait AdmissionGate: Send + Sync {
    /// Wait until one call may start.
    async fn admit(&self);
}

#[async_trait]
impl AdmissionGate for Limiter {
    async fn admit(&self) {
        Limiter::admit(self).await
    }
}

/// A gate that admits every call immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

#[async_trait]
impl AdmissionGate for Unlimited {
    async fn admit(&self) {
        trace!("Call admitted without limit");
    }
}

#[async_trait]
impl<G: AdmissionGate + ?Sized> AdmissionGate for Arc<G> {
    async fn admit(&self) {
        (**self).admit().await
    }
}

/// Run tasks through any [`AdmissionGate`].
pub trait GateExt: AdmissionGate {
    /// Admit, then run `task` and return its output unchanged.
    fn run<F, Fut>(&self, task: F) -> impl Future<Output = Fut::Output> + Send
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future + Send,
    {
        async move {
            self.admit().await;
            task().await
        }
    }
}

impl<G: AdmissionGate + ?Sized> GateExt for G {}
