use capstan_domain::{OperationHeaders, OperationKind, PathAddress, ServiceName};
use capstan_services::{VerificationHandle, VerificationReport};
use serde::Serialize;
use std::time::Duration;

/// Runtime consequence of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", content = "service", rename_all = "kebab-case")]
pub enum RuntimeEffect {
    Install(ServiceName),
    Remove(ServiceName),
    Replace(ServiceName),
    /// The change waits for the next container reload.
    ReloadRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    /// 1-indexed position in the request.
    pub step: usize,
    pub operation: OperationKind,
    pub address: PathAddress,
    pub runtime: Vec<RuntimeEffect>,
}

/// A committed composite request.
///
/// The model change is final. Services the request started may still be activating; their
/// fate is reported by [`ExecutionOutcome::verify`].
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub request_id: String,
    /// Model version after the commit.
    pub version: u64,
    pub steps: Vec<StepOutcome>,
    pub reload_required: bool,
    /// Headers of the request, echoed back.
    pub headers: OperationHeaders,
    pub verification: VerificationHandle,
}

impl ExecutionOutcome {
    /// Waits for the services this request started to settle.
    pub async fn verify(&mut self, timeout: Option<Duration>) -> VerificationReport {
        std::mem::take(&mut self.verification).wait(timeout).await
    }

    /// Services installed, removed, or replaced by the request, in step order.
    pub fn services(&self) -> impl Iterator<Item = &ServiceName> {
        self.steps.iter().flat_map(|s| &s.runtime).filter_map(|effect| match effect {
            RuntimeEffect::Install(name) | RuntimeEffect::Remove(name) | RuntimeEffect::Replace(name) => {
                Some(name)
            },
            RuntimeEffect::ReloadRequired => None,
        })
    }
}
