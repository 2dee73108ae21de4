//! EJB3 and remoting subsystems.
//!
//! The remote service reaches clients through a remoting `http-connector`, which in turn
//! upgrades connections on an Undertow listener and optionally authenticates them with an
//! Elytron SASL authentication factory:
//!
//! ```text
//! ejb3/service=remote -> remoting/http-connector=* -> undertow/.../http-listener=*
//!                                                  -> elytron/sasl-authentication-factory=*
//! ```
//!
//! Changing `connector-ref` of the remote service restarts it, so the request must carry
//! [`OperationHeaders::ALLOW_RESOURCE_SERVICE_RESTART`](capstan_domain::OperationHeaders).

mod remote;
mod remoting;
mod security;

pub use remote::RemoteService;
pub use remoting::RemotingConnector;
pub use security::EjbSecurityDomain;

use capstan_controller::{Extension, ResourceDefinition, ResourceDefinitionRegistry};
use capstan_domain::{AddressPattern, ModelValue, Operation, PathAddress};
use capstan_model::{AttributeDefinition, ResourceSchema};

pub const SUBSYSTEM: &str = "ejb3";
pub const REMOTING_SUBSYSTEM: &str = "remoting";

pub const DEFAULT_CONNECTOR: &str = "http-remoting-connector";

#[derive(Debug, Clone, Copy, Default)]
pub struct RemotingExtension;

impl Extension for RemotingExtension {
    fn name(&self) -> &'static str {
        "remoting"
    }

    fn subsystems(&self) -> &'static [&'static str] {
        &[REMOTING_SUBSYSTEM]
    }

    fn register(&self, definitions: &mut ResourceDefinitionRegistry) {
        let subsystem = AddressPattern::subsystem(REMOTING_SUBSYSTEM);
        definitions.register(
            subsystem.clone(),
            ResourceDefinition::new(
                ResourceSchema::new().attribute(AttributeDefinition::string("worker").default_value("default")),
            ),
        );
        definitions.register(
            subsystem.any("http-connector"),
            ResourceDefinition::new(remoting::schema()).with_services(remoting::HttpConnectorProvider),
        );
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ejb3Extension;

impl Extension for Ejb3Extension {
    fn name(&self) -> &'static str {
        "ejb3"
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
                    .attribute(AttributeDefinition::string("default-security-domain").default_value("other"))
                    .attribute(
                        AttributeDefinition::boolean("default-missing-method-permissions-deny-access")
                            .default_value(true),
                    ),
            ),
        );
        definitions.register(
            subsystem.clone().child("service", "remote"),
            ResourceDefinition::new(remote::schema()).with_services(remote::RemoteServiceProvider),
        );
        definitions.register(
            subsystem.any("application-security-domain"),
            ResourceDefinition::new(security::schema()).with_services(security::EjbSecurityDomainProvider),
        );
    }
}

#[must_use]
pub fn remote_service_address() -> PathAddress {
    PathAddress::subsystem(SUBSYSTEM).append("service", "remote")
}

#[must_use]
pub fn http_connector_address(name: &str) -> PathAddress {
    PathAddress::subsystem(REMOTING_SUBSYSTEM).append("http-connector", name)
}

#[must_use]
pub fn application_security_domain_address(name: &str) -> PathAddress {
    PathAddress::subsystem(SUBSYSTEM).append("application-security-domain", name)
}

/// `add` for a remoting connector on `listener`, authenticated by `sasl_factory` when set.
#[must_use]
pub fn add_http_connector(name: &str, listener: &str, sasl_factory: Option<&str>) -> Operation {
    let mut attributes = vec![("connector-ref", ModelValue::from(listener))];
    if let Some(factory) = sasl_factory {
        attributes.push(("sasl-authentication-factory", ModelValue::from(factory)));
    }
    Operation::add(http_connector_address(name), attributes)
}

#[must_use]
pub fn add_application_security_domain(name: &str, security_domain: &str) -> Operation {
    Operation::add(application_security_domain_address(name), [("security-domain", security_domain)])
}

/// Points the remote service at another connector.
#[must_use]
pub fn write_connector_ref(connector: &str) -> Operation {
    Operation::write_attribute(remote_service_address(), "connector-ref", connector)
}

/// Remoting subsystem, its default connector on the default Undertow listener, the ejb3
/// subsystem, and the remote service on that connector. Expects the Undertow defaults to be
/// applied first.
#[must_use]
pub fn default_operations() -> Vec<Operation> {
    vec![
        Operation::add(PathAddress::subsystem(REMOTING_SUBSYSTEM), Vec::<(&str, ModelValue)>::new()),
        add_http_connector(DEFAULT_CONNECTOR, capstan_undertow::DEFAULT_HTTP_LISTENER, None),
        Operation::add(PathAddress::subsystem(SUBSYSTEM), [("default-security-domain", "other")]),
        Operation::add(remote_service_address(), [("connector-ref", DEFAULT_CONNECTOR)]),
    ]
}
