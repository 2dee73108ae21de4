use capstan_controller::{ResolveContext, ServiceDefinitionProvider};
use capstan_domain::capabilities::{HTTP_AUTHENTICATION_FACTORY, UNDERTOW_APPLICATION_SECURITY_DOMAIN, dynamic};
use capstan_domain::{PathAddress, ServiceName};
use capstan_elytron::HttpAuthenticationFactory;
use capstan_model::{AttributeDefinition, AttributeViolation, ResourceSchema, RestartPolicy};
use capstan_services::{ActivationError, Dependency, FnService, ServiceDefinition, StartContext};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

const FACTORY_KEY: &str = "http-authentication-factory";

/// Maps the security domain name deployments declare onto an HTTP authentication factory.
pub struct WebSecurityDomain {
    pub name: String,
    pub override_deployment_config: bool,
    pub factory: Arc<HttpAuthenticationFactory>,
}

impl Debug for WebSecurityDomain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSecurityDomain")
            .field("name", &self.name)
            .field("override_deployment_config", &self.override_deployment_config)
            .field("factory", &self.factory.name())
            .finish()
    }
}

pub(crate) fn schema() -> ResourceSchema {
    ResourceSchema::new()
        .attribute(
            AttributeDefinition::string("http-authentication-factory")
                .required()
                .references(HTTP_AUTHENTICATION_FACTORY)
                .restart(RestartPolicy::ResourceServices),
        )
        .attribute(
            AttributeDefinition::boolean("override-deployment-config")
                .default_value(false)
                .restart(RestartPolicy::ResourceServices),
        )
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct WebSecurityDomainProvider;

impl ServiceDefinitionProvider for WebSecurityDomainProvider {
    fn service_name(&self, address: &PathAddress) -> ServiceName {
        dynamic(UNDERTOW_APPLICATION_SECURITY_DOMAIN, address.name().unwrap_or_default()).as_str().into()
    }

    fn definition(&self, ctx: &ResolveContext<'_>) -> Result<ServiceDefinition, AttributeViolation> {
        let name = ctx.name().to_owned();
        let override_deployment_config = ctx.boolean("override-deployment-config")?;
        let factory = ctx.capability(HTTP_AUTHENTICATION_FACTORY, "http-authentication-factory")?;
        let service = FnService::new(move |start: &StartContext| -> Result<WebSecurityDomain, ActivationError> {
            Ok(WebSecurityDomain {
                name: name.clone(),
                override_deployment_config,
                factory: start.get(FACTORY_KEY)?,
            })
        });
        Ok(ServiceDefinition::new(self.service_name(ctx.address()), service)
            .requires(Dependency::capability(factory).inject_as(FACTORY_KEY))
            .provides(dynamic(UNDERTOW_APPLICATION_SECURITY_DOMAIN, ctx.name())))
    }
}
