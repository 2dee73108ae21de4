//! Undertow subsystem.
//!
//! Servers and their HTTP listeners are registered here so that remoting connectors can
//! reference a listener by capability. Web application security domains bind a deployment's
//! security domain name to an Elytron HTTP authentication factory.

mod listener;
mod security;

pub use listener::HttpListener;
pub use security::WebSecurityDomain;

use capstan_controller::{Extension, ResourceDefinition, ResourceDefinitionRegistry};
use capstan_domain::{AddressPattern, ModelValue, Operation, PathAddress};
use capstan_model::{AttributeDefinition, ResourceSchema};

pub const SUBSYSTEM: &str = "undertow";

pub const DEFAULT_SERVER: &str = "default-server";
pub const DEFAULT_HTTP_LISTENER: &str = "default";

#[derive(Debug, Clone, Copy, Default)]
pub struct UndertowExtension;

impl Extension for UndertowExtension {
    fn name(&self) -> &'static str {
        "undertow"
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
                    .attribute(AttributeDefinition::string("default-server").default_value(DEFAULT_SERVER))
                    .attribute(AttributeDefinition::string("default-security-domain").default_value("other")),
            ),
        );
        definitions.register(subsystem.clone().any("server"), ResourceDefinition::new(listener::server_schema()));
        definitions.register(
            subsystem.clone().any("server").any("http-listener"),
            ResourceDefinition::new(listener::listener_schema()).with_services(listener::HttpListenerProvider),
        );
        definitions.register(
            subsystem.any("application-security-domain"),
            ResourceDefinition::new(security::schema()).with_services(security::WebSecurityDomainProvider),
        );
    }
}

#[must_use]
pub fn server_address(server: &str) -> PathAddress {
    PathAddress::subsystem(SUBSYSTEM).append("server", server)
}

#[must_use]
pub fn http_listener_address(server: &str, listener: &str) -> PathAddress {
    server_address(server).append("http-listener", listener)
}

#[must_use]
pub fn application_security_domain_address(name: &str) -> PathAddress {
    PathAddress::subsystem(SUBSYSTEM).append("application-security-domain", name)
}

#[must_use]
pub fn add_application_security_domain(name: &str, http_authentication_factory: &str) -> Operation {
    Operation::add(
        application_security_domain_address(name),
        [("http-authentication-factory", http_authentication_factory)],
    )
}

/// The subsystem, the default server, and its default HTTP listener.
#[must_use]
pub fn default_operations() -> Vec<Operation> {
    vec![
        Operation::add(PathAddress::subsystem(SUBSYSTEM), Vec::<(&str, ModelValue)>::new()),
        Operation::add(server_address(DEFAULT_SERVER), [("default-host", "default-host")]),
        Operation::add(http_listener_address(DEFAULT_SERVER, DEFAULT_HTTP_LISTENER), [("port", 8080)]),
    ]
}
