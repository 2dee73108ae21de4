//! Mechanism factories and the authentication factories that pair them with a domain.

use crate::capability_service;
use crate::domain::SecurityDomain;
use capstan_controller::{ResolveContext, ServiceDefinitionProvider};
use capstan_domain::capabilities::{
    HTTP_AUTHENTICATION_FACTORY, HTTP_SERVER_MECHANISM_FACTORY, SASL_AUTHENTICATION_FACTORY,
    SASL_SERVER_FACTORY, SECURITY_DOMAIN, dynamic,
};
use capstan_domain::{ModelValue, PathAddress, ServiceName};
use capstan_model::{AttributeDefinition, AttributeViolation, ResourceSchema, RestartPolicy};
use capstan_services::{
    ActivationError, Dependency, FnService, ServiceDefinition, StartContext, ValueService,
};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

const DOMAIN_KEY: &str = "security-domain";
const FACTORY_KEY: &str = "mechanism-factory";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslServerFactory {
    pub name: String,
    pub server_name: Option<String>,
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpServerMechanismFactory {
    pub name: String,
    pub providers: Option<String>,
}

/// One configured mechanism; `realms` lists the realm names it advertises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MechanismConfiguration {
    pub mechanism: String,
    pub realms: Vec<String>,
}

/// A mechanism factory bound to the domain that verifies the credentials it receives.
pub struct AuthenticationFactory<F> {
    name: String,
    factory: Arc<F>,
    domain: Arc<SecurityDomain>,
    mechanisms: Vec<MechanismConfiguration>,
}

impl<F> AuthenticationFactory<F> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    #[must_use]
    pub fn security_domain(&self) -> &SecurityDomain {
        &self.domain
    }

    #[must_use]
    pub fn mechanisms(&self) -> &[MechanismConfiguration] {
        &self.mechanisms
    }

    /// Mechanism names in configuration order.
    pub fn mechanism_names(&self) -> impl Iterator<Item = &str> {
        self.mechanisms.iter().map(|m| m.mechanism.as_str())
    }
}

impl<F> Debug for AuthenticationFactory<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationFactory")
            .field("name", &self.name)
            .field("domain", &self.domain.name())
            .field("mechanisms", &self.mechanisms)
            .finish_non_exhaustive()
    }
}

pub type SaslAuthenticationFactory = AuthenticationFactory<SaslServerFactory>;
pub type HttpAuthenticationFactory = AuthenticationFactory<HttpServerMechanismFactory>;

pub(crate) fn sasl_server_factory_schema() -> ResourceSchema {
    ResourceSchema::new()
        .attribute(AttributeDefinition::string("server-name").restart(RestartPolicy::ResourceServices))
        .attribute(AttributeDefinition::string("protocol").restart(RestartPolicy::ResourceServices))
}

pub(crate) fn http_mechanism_factory_schema() -> ResourceSchema {
    ResourceSchema::new().attribute(AttributeDefinition::string("providers"))
}

fn authentication_schema(mechanism_factory: &str, factory_capability: &str, realms: bool) -> ResourceSchema {
    let mut fields = vec![AttributeDefinition::string("mechanism-name").required()];
    if realms {
        fields.push(AttributeDefinition::list(
            "mechanism-realm-configurations",
            AttributeDefinition::object("mechanism-realm", [AttributeDefinition::string("realm-name").required()]),
        ));
    }
    ResourceSchema::new()
        .attribute(
            AttributeDefinition::string(mechanism_factory)
                .required()
                .references(factory_capability)
                .restart(RestartPolicy::ResourceServices),
        )
        .attribute(
            AttributeDefinition::string("security-domain")
                .required()
                .references(SECURITY_DOMAIN)
                .restart(RestartPolicy::ResourceServices),
        )
        .attribute(
            AttributeDefinition::list(
                "mechanism-configurations",
                AttributeDefinition::object("mechanism-configuration", fields),
            )
            .restart(RestartPolicy::ResourceServices),
        )
}

pub(crate) fn sasl_authentication_schema() -> ResourceSchema {
    authentication_schema("sasl-server-factory", SASL_SERVER_FACTORY, false)
}

pub(crate) fn http_authentication_schema() -> ResourceSchema {
    authentication_schema("http-server-mechanism-factory", HTTP_SERVER_MECHANISM_FACTORY, true)
}

fn mechanisms(items: &[ModelValue]) -> Vec<MechanismConfiguration> {
    items
        .iter()
        .filter_map(|item| {
            let mechanism = item.get("mechanism-name")?.as_str()?.to_owned();
            let realms = item
                .get("mechanism-realm-configurations")
                .and_then(ModelValue::as_list)
                .unwrap_or_default()
                .iter()
                .filter_map(|realm| realm.get("realm-name")?.as_str().map(str::to_owned))
                .collect();
            Some(MechanismConfiguration { mechanism, realms })
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SaslServerFactoryProvider;

impl ServiceDefinitionProvider for SaslServerFactoryProvider {
    fn service_name(&self, address: &PathAddress) -> ServiceName {
        capability_service(SASL_SERVER_FACTORY, address)
    }

    fn definition(&self, ctx: &ResolveContext<'_>) -> Result<ServiceDefinition, AttributeViolation> {
        let factory = SaslServerFactory {
            name: ctx.name().to_owned(),
            server_name: ctx.optional_string("server-name"),
            protocol: ctx.optional_string("protocol"),
        };
        Ok(ServiceDefinition::new(self.service_name(ctx.address()), ValueService::new(factory))
            .provides(dynamic(SASL_SERVER_FACTORY, ctx.name())))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct HttpMechanismFactoryProvider;

impl ServiceDefinitionProvider for HttpMechanismFactoryProvider {
    fn service_name(&self, address: &PathAddress) -> ServiceName {
        capability_service(HTTP_SERVER_MECHANISM_FACTORY, address)
    }

    fn definition(&self, ctx: &ResolveContext<'_>) -> Result<ServiceDefinition, AttributeViolation> {
        let factory = HttpServerMechanismFactory {
            name: ctx.name().to_owned(),
            providers: ctx.optional_string("providers"),
        };
        Ok(ServiceDefinition::new(self.service_name(ctx.address()), ValueService::new(factory))
            .provides(dynamic(HTTP_SERVER_MECHANISM_FACTORY, ctx.name())))
    }
}

/// Builds `sasl-authentication-factory` and `http-authentication-factory` services; the
/// two differ only in the capabilities involved and the mechanism factory type.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AuthenticationFactoryProvider {
    capability: &'static str,
    factory_attribute: &'static str,
    factory_capability: &'static str,
    http: bool,
}

impl AuthenticationFactoryProvider {
    pub(crate) const SASL: Self = Self {
        capability: SASL_AUTHENTICATION_FACTORY,
        factory_attribute: "sasl-server-factory",
        factory_capability: SASL_SERVER_FACTORY,
        http: false,
    };

    pub(crate) const HTTP: Self = Self {
        capability: HTTP_AUTHENTICATION_FACTORY,
        factory_attribute: "http-server-mechanism-factory",
        factory_capability: HTTP_SERVER_MECHANISM_FACTORY,
        http: true,
    };
}

impl ServiceDefinitionProvider for AuthenticationFactoryProvider {
    fn service_name(&self, address: &PathAddress) -> ServiceName {
        capability_service(self.capability, address)
    }

    fn definition(&self, ctx: &ResolveContext<'_>) -> Result<ServiceDefinition, AttributeViolation> {
        let name = ctx.name().to_owned();
        let configured = mechanisms(&ctx.list("mechanism-configurations"));
        let dependencies = [
            Dependency::capability(ctx.capability(self.factory_capability, self.factory_attribute)?)
                .inject_as(FACTORY_KEY),
            Dependency::capability(ctx.capability(SECURITY_DOMAIN, "security-domain")?).inject_as(DOMAIN_KEY),
        ];
        let service_name = self.service_name(ctx.address());
        let definition = if self.http {
            ServiceDefinition::new(service_name, factory_service::<HttpServerMechanismFactory>(name, configured))
        } else {
            ServiceDefinition::new(service_name, factory_service::<SaslServerFactory>(name, configured))
        };
        Ok(definition.requires_all(dependencies).provides(dynamic(self.capability, ctx.name())))
    }
}

fn factory_service<F: Send + Sync + 'static>(
    name: String,
    mechanisms: Vec<MechanismConfiguration>,
) -> FnService<impl Fn(&StartContext) -> Result<AuthenticationFactory<F>, ActivationError> + Send + Sync + 'static> {
    FnService::new(move |ctx: &StartContext| -> Result<AuthenticationFactory<F>, ActivationError> {
        Ok(AuthenticationFactory {
            name: name.clone(),
            factory: ctx.get::<F>(FACTORY_KEY)?,
            domain: ctx.get::<SecurityDomain>(DOMAIN_KEY)?,
            mechanisms: mechanisms.clone(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mechanism_realms_are_flattened() {
        let items = [
            ModelValue::object([
                ("mechanism-name", ModelValue::from("BASIC")),
                (
                    "mechanism-realm-configurations",
                    ModelValue::list([ModelValue::object([("realm-name", "ApplicationRealm")])]),
                ),
            ]),
            ModelValue::object([("mechanism-name", "DIGEST-MD5")]),
        ];
        let parsed = mechanisms(&items);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].realms, ["ApplicationRealm"]);
        assert!(parsed[1].realms.is_empty());
    }
}
