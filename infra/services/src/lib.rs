//! # Service Registry
//!
//! Runtime services, their dependencies, and the capabilities they publish.
//!
//! A [`ServiceDefinition`] names a service, declares what it requires (other services or
//! abstract capabilities, each required or optional), and lists the capabilities it provides.
//! The [`ServiceRegistry`] owns every definition, resolves capabilities through a
//! [`CapabilityDirectory`], and activates services dependencies-first on tokio tasks.
//!
//! Structural changes coming from configuration go through a [`BatchPlan`]: the caller
//! queues [`RuntimeAction`]s, verifies the batch, and only then commits it. Commit returns a
//! [`VerificationHandle`] that resolves once every started service settles.
//!
//! ```rust
//! use capstan_services::{Dependency, ServiceDefinition, ServiceRegistry, ValueService};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = ServiceRegistry::new();
//! registry.register(ServiceDefinition::new("realm", ValueService::new("users")).provides("realm")).unwrap();
//! let domain = ServiceDefinition::new("domain", ValueService::new(()))
//!     .requires(Dependency::capability("realm"));
//!
//! let handle = registry.install(domain).unwrap();
//! assert!(handle.wait().await.is_up());
//! assert_eq!(*registry.value::<&str>(&"realm".into()).unwrap(), "users");
//! # }
//! ```

mod capability;
mod definition;
mod error;
mod graph;
mod handle;
mod plan;
mod registry;
mod verification;

pub use capability::CapabilityDirectory;
pub use definition::{
    Dependency, DependencyTarget, FnService, Service, ServiceDefinition, ServiceValue, StartContext,
    ValueService,
};
pub use error::{ActivationError, ActivationErrorExt, CommitError, RegistryError};
pub use handle::{ServiceHandle, StartHandle, StartOutcome};
pub use plan::{BatchPlan, RuntimeAction};
pub use registry::{ServiceInfo, ServiceRegistry};
pub use verification::{VerificationHandle, VerificationReport};

pub use async_trait::async_trait;
