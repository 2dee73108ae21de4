//! Facade crate for the Capstan container.
//! Re-exports the request and model primitives and composes the enabled subsystems.
//! Keep this crate thin: it should wire other crates together, not implement subsystems.
//!
//! ## Usage
//! - Add `capstan` with the desired subsystem features (`full` by default).
//! - Build a [`Container`], boot it with [`default_profile`] plus any boot requests, then
//!   submit runtime [`CompositeRequest`]s through [`Container::execute`].
//!
//! ```rust,no_run
//! use capstan::{Container, default_profile};
//!
//! # async fn run() -> Result<(), capstan::ContainerError> {
//! let container = Container::builder().default_extensions().build()?;
//! container.boot([default_profile()]).await?;
//! // ...
//! container.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod container;
mod error;
pub mod features;
mod profile;

pub use container::{Container, ContainerBuilder};
pub use error::ContainerError;
pub use profile::{DEFAULT_PROFILE_ID, default_profile, load_boot_file};

pub use capstan_controller::{
    ControllerError, ErrorKind, ExecutionOutcome, Extension, ModelController, OperationError,
    ResolveContext, ResourceDefinition, ResourceDefinitionRegistry, RuntimeEffect,
    ServiceDefinitionProvider,
};
pub use capstan_domain as domain;
pub use capstan_domain::{CompositeRequest, ModelValue, Operation, OperationHeaders, PathAddress};
pub use capstan_event_bus as events;
pub use capstan_kernel as kernel;
pub use capstan_model as model;
pub use capstan_services as services;
