use crate::error::ContainerError;
use capstan_domain::{CompositeRequest, Operation};
use std::path::Path;
use tracing::debug;

pub const DEFAULT_PROFILE_ID: &str = "default-profile";

/// Subsystems and the resources every container starts with: mappers and mechanism
/// factories, the default server and listener, the default context service and managed
/// executor, the `http-remoting-connector`, and the EJB remote service on top of it.
#[must_use]
pub fn default_profile() -> CompositeRequest {
    let mut steps: Vec<Operation> = Vec::new();
    #[cfg(feature = "elytron")]
    steps.extend(capstan_elytron::default_operations());
    #[cfg(feature = "undertow")]
    steps.extend(capstan_undertow::default_operations());
    #[cfg(feature = "ee")]
    steps.extend(capstan_ee::default_operations());
    #[cfg(feature = "ejb3")]
    steps.extend(capstan_ejb3::default_operations());
    CompositeRequest::new().with_id(DEFAULT_PROFILE_ID).steps(steps)
}

/// Reads a JSON array of composite requests.
///
/// # Errors
///
/// [`ContainerError::BootFileIo`] or [`ContainerError::BootFileFormat`].
pub async fn load_boot_file(path: impl AsRef<Path>) -> Result<Vec<CompositeRequest>, ContainerError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ContainerError::BootFileIo { path: path.to_owned(), source })?;
    let requests: Vec<CompositeRequest> = serde_json::from_str(&text)
        .map_err(|source| ContainerError::BootFileFormat { path: path.to_owned(), source })?;
    debug!(path = %path.display(), requests = requests.len(), "Boot file loaded");
    Ok(requests)
}
