use capstan_controller::{ResolveContext, ServiceDefinitionProvider};
use capstan_domain::capabilities::{EE_CONTEXT_SERVICE, dynamic};
use capstan_domain::{PathAddress, ServiceName};
use capstan_model::{AttributeDefinition, AttributeViolation, ResourceSchema};
use capstan_services::{ServiceDefinition, ValueService};

/// Runtime value of a `context-service` resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextService {
    pub name: String,
    pub jndi_name: String,
    pub use_transaction_setup_provider: bool,
}

pub(crate) fn schema() -> ResourceSchema {
    ResourceSchema::new()
        .attribute(AttributeDefinition::string("jndi-name").required().length(1, 512))
        .attribute(AttributeDefinition::boolean("use-transaction-setup-provider").default_value(false))
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ContextServiceProvider;

impl ServiceDefinitionProvider for ContextServiceProvider {
    fn service_name(&self, address: &PathAddress) -> ServiceName {
        dynamic(EE_CONTEXT_SERVICE, address.name().unwrap_or_default()).as_str().into()
    }

    fn definition(&self, ctx: &ResolveContext<'_>) -> Result<ServiceDefinition, AttributeViolation> {
        let value = ContextService {
            name: ctx.name().to_owned(),
            jndi_name: ctx.string("jndi-name")?,
            use_transaction_setup_provider: ctx.boolean("use-transaction-setup-provider")?,
        };
        Ok(ServiceDefinition::new(self.service_name(ctx.address()), ValueService::new(value))
            .provides(dynamic(EE_CONTEXT_SERVICE, ctx.name())))
    }
}
