//! EE subsystem: concurrency resources.
//!
//! * `/subsystem=ee/context-service=*` publishes a [`ContextService`].
//! * `/subsystem=ee/managed-executor-service=*` publishes a [`ManagedExecutor`]. It is a
//!   boot-time resource: its service is only installed while the container boots, later
//!   changes flag the container for reload.

mod context;
mod error;
mod executor;
mod managed_executor;

pub use context::ContextService;
pub use error::ExecutorError;
pub use executor::{ExecutorSettings, ManagedExecutor, RejectPolicy};

use capstan_controller::{Extension, ResourceDefinition, ResourceDefinitionRegistry};
use capstan_domain::{AddressPattern, Operation, PathAddress};
use capstan_model::{AttributeDefinition, ResourceSchema};

pub const SUBSYSTEM: &str = "ee";

pub const DEFAULT_CONTEXT_SERVICE: &str = "default";
pub const DEFAULT_MANAGED_EXECUTOR: &str = "default";

#[derive(Debug, Clone, Copy, Default)]
pub struct EeExtension;

impl Extension for EeExtension {
    fn name(&self) -> &'static str {
        "ee"
    }

    fn subsystems(&self) -> &'static [&'static str] {
        &[SUBSYSTEM]
    }

    fn register(&self, definitions: &mut ResourceDefinitionRegistry) {
        let subsystem = AddressPattern::subsystem(SUBSYSTEM);
        definitions.register(
            subsystem.clone(),
            ResourceDefinition::new(
                ResourceSchema::new()
                    .attribute(AttributeDefinition::boolean("annotation-property-replacement").default_value(false))
                    .attribute(AttributeDefinition::boolean("spec-descriptor-property-replacement").default_value(true)),
            ),
        );
        definitions.register(
            subsystem.clone().any("context-service"),
            ResourceDefinition::new(context::schema()).with_services(context::ContextServiceProvider),
        );
        definitions.register(
            subsystem.any("managed-executor-service"),
            ResourceDefinition::new(managed_executor::schema())
                .with_services(managed_executor::ManagedExecutorProvider)
                .boot_only(),
        );
    }
}

#[must_use]
pub fn context_service_address(name: &str) -> PathAddress {
    PathAddress::subsystem(SUBSYSTEM).append("context-service", name)
}

#[must_use]
pub fn managed_executor_address(name: &str) -> PathAddress {
    PathAddress::subsystem(SUBSYSTEM).append("managed-executor-service", name)
}

/// Boot operations for the subsystem, its default context service, and the default
/// managed executor wired to that context service.
#[must_use]
pub fn default_operations() -> Vec<Operation> {
    vec![
        Operation::add(PathAddress::subsystem(SUBSYSTEM), [("spec-descriptor-property-replacement", false)]),
        Operation::add(
            context_service_address(DEFAULT_CONTEXT_SERVICE),
            [("jndi-name", "java:jboss/ee/concurrency/context/default")],
        ),
        Operation::add(
            managed_executor_address(DEFAULT_MANAGED_EXECUTOR),
            [
                ("jndi-name", "java:jboss/ee/concurrency/executor/default"),
                ("context-service", DEFAULT_CONTEXT_SERVICE),
            ],
        ),
    ]
}
