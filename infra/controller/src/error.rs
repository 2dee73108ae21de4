use capstan_domain::{PathAddress, ServiceName};
use capstan_model::ModelError;
use capstan_services::RegistryError;
use serde::Serialize;
use strum_macros::Display;

/// Broad classification callers can branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// The request itself is wrong: bad attribute, refused restart.
    Validation,
    /// The request does not fit the current resource or service tree.
    ModelStructure,
    /// Service dependencies cannot be satisfied.
    Dependency,
    /// A service failed to start or stop.
    Activation,
    /// Undoing a failed request did not complete; the model needs reconciliation.
    Rollback,
}

/// Why a single step failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(
        "Changing '{attribute}' of {address} restarts {service}; the request does not allow resource service restarts"
    )]
    RestartRefused { address: PathAddress, attribute: String, service: ServiceName },
}

impl OperationError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Model(e) if e.is_validation() => ErrorKind::Validation,
            Self::Model(_) => ErrorKind::ModelStructure,
            Self::Registry(RegistryError::Activation { .. }) => ErrorKind::Activation,
            Self::Registry(e) if e.is_dependency_error() => ErrorKind::Dependency,
            Self::Registry(_) => ErrorKind::ModelStructure,
            Self::RestartRefused { .. } => ErrorKind::Validation,
        }
    }
}

/// Outcome of a composite request that did not commit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    /// The request was fully reverted.
    #[error("Step {step} ({address}) failed: {source}")]
    StepFailed { step: usize, address: PathAddress, source: OperationError },

    /// Reverting a failed request failed too. Model state is undefined.
    #[error(
        "Step {step} ({address}) failed: {source}; reverting step {undo_step} also failed: {rollback}"
    )]
    RollbackFailed {
        step: usize,
        address: PathAddress,
        source: OperationError,
        undo_step: usize,
        rollback: ModelError,
    },

    /// The model committed but the registry applied only part of the runtime changes.
    #[error("Runtime changes from step {step} ({address}) were only partly applied: {source}")]
    Inconsistent { step: usize, address: PathAddress, source: RegistryError },
}

impl ControllerError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::StepFailed { source, .. } => source.kind(),
            Self::RollbackFailed { .. } | Self::Inconsistent { .. } => ErrorKind::Rollback,
        }
    }

    /// 1-indexed step that failed.
    #[must_use]
    pub const fn step(&self) -> usize {
        match self {
            Self::StepFailed { step, .. }
            | Self::RollbackFailed { step, .. }
            | Self::Inconsistent { step, .. } => *step,
        }
    }

    #[must_use]
    pub const fn address(&self) -> &PathAddress {
        match self {
            Self::StepFailed { address, .. }
            | Self::RollbackFailed { address, .. }
            | Self::Inconsistent { address, .. } => address,
        }
    }

    /// The request left no trace in the model.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::StepFailed { .. })
    }
}
