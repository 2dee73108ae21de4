//! # Model Controller
//!
//! Applies [`CompositeRequest`](capstan_domain::CompositeRequest)s to the configuration model
//! as all-or-nothing units and turns the model changes into runtime actions on the
//! [`ServiceRegistry`](capstan_services::ServiceRegistry).
//!
//! Steps run strictly in order. Each applied step leaves an undo record; the first failure
//! replays those records newest-first, so the model ends up exactly where it started. Once
//! every step has gone through, the queued runtime batch is verified and committed in one go.
//!
//! Resource types are described by [`ResourceDefinition`]s: a schema for the model, an
//! optional [`ServiceDefinitionProvider`] that builds the backing service, and whether the
//! runtime side only changes during boot.
//!
//! ```rust
//! use capstan_controller::{ModelController, ResourceDefinition, ResourceDefinitionRegistry};
//! use capstan_domain::{AddressPattern, CompositeRequest, Operation, PathAddress};
//! use capstan_event_bus::EventBus;
//! use capstan_model::{AttributeDefinition, ResourceSchema};
//! use capstan_services::ServiceRegistry;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut definitions = ResourceDefinitionRegistry::new();
//! definitions.register(
//!     AddressPattern::subsystem("ee"),
//!     ResourceDefinition::new(
//!         ResourceSchema::new().attribute(AttributeDefinition::boolean("spec-descriptor-property-replacement")),
//!     ),
//! );
//! let controller = ModelController::new(definitions, ServiceRegistry::new(), EventBus::new());
//!
//! let request = CompositeRequest::from(Operation::add(PathAddress::subsystem("ee"), [("spec-descriptor-property-replacement", true)]));
//! let outcome = controller.execute(request).await.unwrap();
//! assert_eq!(outcome.version, 1);
//! assert!(controller.snapshot().contains(&PathAddress::subsystem("ee")));
//! # }
//! ```

mod context;
mod controller;
mod error;
pub mod executor;
mod extension;
mod outcome;
mod registry;
mod runner;

pub use context::ResolveContext;
pub use controller::ModelController;
pub use error::{ControllerError, ErrorKind, OperationError};
pub use extension::Extension;
pub use outcome::{ExecutionOutcome, RuntimeEffect, StepOutcome};
pub use registry::{ResourceDefinition, ResourceDefinitionRegistry, ServiceDefinitionProvider};
