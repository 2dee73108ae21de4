use crate::error::RegistryError;
use crate::handle::{StartHandle, StartOutcome};
use capstan_domain::ServiceName;
use std::time::Duration;
use tokio::time::Instant;

/// Start requests issued by a batch commit, awaited together.
#[derive(Debug, Default)]
pub struct VerificationHandle {
    pending: Vec<StartHandle>,
    rejected: Vec<(ServiceName, RegistryError)>,
}

impl VerificationHandle {
    /// Tracks `handle` unless a handle for the same service is already tracked.
    pub fn push(&mut self, handle: StartHandle) {
        if !self.pending.iter().any(|h| h.name() == handle.name()) {
            self.pending.push(handle);
        }
    }

    pub fn extend(&mut self, handles: impl IntoIterator<Item = StartHandle>) {
        for handle in handles {
            self.push(handle);
        }
    }

    /// Records a start request the registry refused outright.
    pub fn reject(&mut self, name: ServiceName, error: RegistryError) {
        self.rejected.push((name, error));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len() + self.rejected.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits for every tracked service to settle. With a `timeout`, services still
    /// activating at the deadline are reported as timed out.
    pub async fn wait(self, timeout: Option<Duration>) -> VerificationReport {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut report = VerificationReport::default();
        for (name, error) in self.rejected {
            report.failed.push((name, error.to_string()));
        }
        for handle in self.pending {
            let name = handle.name().clone();
            let outcome = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, handle.wait()).await.ok(),
                None => Some(handle.wait().await),
            };
            match outcome {
                Some(StartOutcome::Up) => report.up.push(name),
                Some(StartOutcome::Failed(error)) => report.failed.push((name, error.to_string())),
                Some(StartOutcome::Cancelled | StartOutcome::Removed) => report.cancelled.push(name),
                None => report.timed_out.push(name),
            }
        }
        report
    }
}

/// Where each service of a batch ended up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub up: Vec<ServiceName>,
    pub failed: Vec<(ServiceName, String)>,
    pub cancelled: Vec<ServiceName>,
    pub timed_out: Vec<ServiceName>,
}

impl VerificationReport {
    /// Nothing failed and nothing is still pending.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.timed_out.is_empty()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.up.is_empty()
            && self.failed.is_empty()
            && self.cancelled.is_empty()
            && self.timed_out.is_empty()
    }
}
