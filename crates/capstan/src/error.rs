use capstan_controller::{ControllerError, ErrorKind};
use capstan_domain::ProcessState;
use capstan_services::VerificationReport;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("Subsystem '{subsystem}' is claimed by both '{first}' and '{second}'")]
    DuplicateSubsystem { subsystem: &'static str, first: &'static str, second: &'static str },

    #[error("Cannot {action} while the container is {state}")]
    InvalidState { action: &'static str, state: ProcessState },

    #[error("Boot request {request} failed: {source}")]
    BootRequest { request: usize, source: ControllerError },

    #[error(
        "Boot did not settle: {} service(s) failed, {} timed out",
        .report.failed.len(),
        .report.timed_out.len()
    )]
    BootVerification { report: VerificationReport },

    #[error("Cannot read boot file {}: {source}", .path.display())]
    BootFileIo { path: PathBuf, source: std::io::Error },

    #[error("Boot file {} is not a list of composite requests: {source}", .path.display())]
    BootFileFormat { path: PathBuf, source: serde_json::Error },

    #[error(transparent)]
    Controller(#[from] ControllerError),
}

impl ContainerError {
    /// Classification of the underlying request failure, if any.
    #[must_use]
    pub const fn request_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::BootRequest { source, .. } | Self::Controller(source) => Some(source.kind()),
            _ => None,
        }
    }
}
