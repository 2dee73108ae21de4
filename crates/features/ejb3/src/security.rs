use capstan_controller::{ResolveContext, ServiceDefinitionProvider};
use capstan_domain::capabilities::{EJB_APPLICATION_SECURITY_DOMAIN, SECURITY_DOMAIN, dynamic};
use capstan_domain::{PathAddress, ServiceName};
use capstan_elytron::SecurityDomain;
use capstan_model::{AttributeDefinition, AttributeViolation, ResourceSchema, RestartPolicy};
use capstan_services::{ActivationError, Dependency, FnService, ServiceDefinition, StartContext};
use std::sync::Arc;

const DOMAIN_KEY: &str = "security-domain";

/// Maps the security domain name EJB deployments declare onto an Elytron security domain.
#[derive(Debug)]
pub struct EjbSecurityDomain {
    pub name: String,
    pub enable_jacc: bool,
    pub domain: Arc<SecurityDomain>,
}

pub(crate) fn schema() -> ResourceSchema {
    ResourceSchema::new()
        .attribute(
            AttributeDefinition::string("security-domain")
                .required()
                .references(SECURITY_DOMAIN)
                .restart(RestartPolicy::ResourceServices),
        )
        .attribute(AttributeDefinition::boolean("enable-jacc").default_value(false).restart(RestartPolicy::Reload))
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct EjbSecurityDomainProvider;

impl ServiceDefinitionProvider for EjbSecurityDomainProvider {
    fn service_name(&self, address: &PathAddress) -> ServiceName {
        dynamic(EJB_APPLICATION_SECURITY_DOMAIN, address.name().unwrap_or_default()).as_str().into()
    }

    fn definition(&self, ctx: &ResolveContext<'_>) -> Result<ServiceDefinition, AttributeViolation> {
        let name = ctx.name().to_owned();
        let enable_jacc = ctx.boolean("enable-jacc")?;
        let service = FnService::new(move |start: &StartContext| -> Result<EjbSecurityDomain, ActivationError> {
            Ok(EjbSecurityDomain { name: name.clone(), enable_jacc, domain: start.get(DOMAIN_KEY)? })
        });
        Ok(ServiceDefinition::new(self.service_name(ctx.address()), service)
            .requires(Dependency::capability(ctx.capability(SECURITY_DOMAIN, "security-domain")?).inject_as(DOMAIN_KEY))
            .provides(dynamic(EJB_APPLICATION_SECURITY_DOMAIN, ctx.name())))
    }
}
