use crate::error::ActivationError;
use crate::registry::ServiceRegistry;
use capstan_domain::{ServiceName, ServiceState};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// One-shot cancellation flag for a single activation attempt.
#[derive(Debug)]
pub(crate) struct CancelSignal {
    tx: watch::Sender<bool>,
}

impl CancelSignal {
    pub(crate) fn new() -> Self {
        Self { tx: watch::channel(false).0 }
    }

    pub(crate) fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Watches the lifecycle state of a registered service.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    name: ServiceName,
    status: watch::Receiver<ServiceState>,
}

impl ServiceHandle {
    pub(crate) const fn new(name: ServiceName, status: watch::Receiver<ServiceState>) -> Self {
        Self { name, status }
    }

    #[must_use]
    pub const fn name(&self) -> &ServiceName {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> ServiceState {
        *self.status.borrow()
    }

    /// Waits until the service reaches `state`. Returns `false` if it was removed first.
    pub async fn wait_for(&mut self, state: ServiceState) -> bool {
        self.status.wait_for(|current| *current == state).await.is_ok()
    }
}

/// How a start request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Up,
    Failed(ActivationError),
    /// Activation was abandoned and the service is back in `DEFINED`.
    Cancelled,
    Removed,
}

impl StartOutcome {
    #[must_use]
    pub const fn is_up(&self) -> bool {
        matches!(self, Self::Up)
    }
}

/// Tracks one start request until the target service settles.
#[derive(Debug)]
pub struct StartHandle {
    registry: ServiceRegistry,
    name: ServiceName,
    status: watch::Receiver<ServiceState>,
    cancel: Arc<CancelSignal>,
}

impl StartHandle {
    pub(crate) const fn new(
        registry: ServiceRegistry,
        name: ServiceName,
        status: watch::Receiver<ServiceState>,
        cancel: Arc<CancelSignal>,
    ) -> Self {
        Self { registry, name, status, cancel }
    }

    #[must_use]
    pub const fn name(&self) -> &ServiceName {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> ServiceState {
        *self.status.borrow()
    }

    /// Abandons the activation. A service still resolving dependencies returns to `DEFINED`;
    /// one that is starting or already up is stopped once it reaches `UP`.
    pub fn cancel(&self) {
        self.cancel.cancel();
        if self.state() == ServiceState::Up {
            let registry = self.registry.clone();
            let name = self.name.clone();
            tokio::spawn(async move {
                if let Err(e) = registry.stop(&name).await {
                    warn!(service = %name, error = %e, "Stopping cancelled service failed");
                }
            });
        }
    }

    pub async fn wait(mut self) -> StartOutcome {
        let settled = self.status.wait_for(|state| state.is_settled()).await.map(|state| *state);
        match settled {
            Ok(ServiceState::Up) => StartOutcome::Up,
            Ok(ServiceState::Failed) => StartOutcome::Failed(
                self.registry
                    .failure(&self.name)
                    .unwrap_or_else(|| ActivationError::start("service failed without a reason")),
            ),
            Ok(ServiceState::Removed) | Err(_) => StartOutcome::Removed,
            Ok(_) => StartOutcome::Cancelled,
        }
    }
}
