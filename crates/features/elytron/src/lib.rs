//! Elytron subsystem: where identities come from and how they authenticate.
//!
//! Every resource below `/subsystem=elytron` publishes a dynamic capability named after
//! the resource, and its service is registered under that same name. A security domain
//! therefore resolves its realms by capability alone, whichever resource provides them.

mod domain;
mod factories;
mod mappers;
mod realm;

pub use domain::{DomainRealm, Identity, SecurityDomain};
pub use factories::{
    AuthenticationFactory, HttpAuthenticationFactory, HttpServerMechanismFactory,
    MechanismConfiguration, SaslAuthenticationFactory, SaslServerFactory,
};
pub use mappers::{PermissionMapper, RoleDecoder};
pub use realm::PropertiesRealm;

use capstan_controller::{Extension, ResourceDefinition, ResourceDefinitionRegistry};
use capstan_domain::capabilities::dynamic;
use capstan_domain::{AddressPattern, ModelValue, Operation, PathAddress, ServiceName};
use capstan_model::ResourceSchema;
use factories::AuthenticationFactoryProvider;

pub const SUBSYSTEM: &str = "elytron";

pub const DEFAULT_PERMISSION_MAPPER: &str = "default-permission-mapper";
pub const GROUPS_TO_ROLES: &str = "groups-to-roles";
pub const DEFAULT_SASL_SERVER_FACTORY: &str = "configured";
pub const DEFAULT_HTTP_MECHANISM_FACTORY: &str = "global";

pub(crate) fn capability_service(capability: &str, address: &PathAddress) -> ServiceName {
    dynamic(capability, address.name().unwrap_or_default()).as_str().into()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ElytronExtension;

impl Extension for ElytronExtension {
    fn name(&self) -> &'static str {
        "elytron"
    }

    fn subsystems(&self) -> &'static [&'static str] {
        &[SUBSYSTEM]
    }

    fn register(&self, definitions: &mut ResourceDefinitionRegistry) {
        let subsystem = AddressPattern::subsystem(SUBSYSTEM);
        let child = |kind: &str| subsystem.clone().any(kind);

        definitions.register(subsystem.clone(), ResourceDefinition::new(ResourceSchema::new()));
        definitions.register(
            child("properties-realm"),
            ResourceDefinition::new(realm::schema()).with_services(realm::PropertiesRealmProvider),
        );
        definitions.register(
            child("simple-role-decoder"),
            ResourceDefinition::new(mappers::role_decoder_schema()).with_services(mappers::RoleDecoderProvider),
        );
        definitions.register(
            child("simple-permission-mapper"),
            ResourceDefinition::new(mappers::permission_mapper_schema())
                .with_services(mappers::PermissionMapperProvider),
        );
        definitions.register(
            child("security-domain"),
            ResourceDefinition::new(domain::schema()).with_services(domain::SecurityDomainProvider),
        );
        definitions.register(
            child("configurable-sasl-server-factory"),
            ResourceDefinition::new(factories::sasl_server_factory_schema())
                .with_services(factories::SaslServerFactoryProvider),
        );
        definitions.register(
            child("provider-http-server-mechanism-factory"),
            ResourceDefinition::new(factories::http_mechanism_factory_schema())
                .with_services(factories::HttpMechanismFactoryProvider),
        );
        definitions.register(
            child("sasl-authentication-factory"),
            ResourceDefinition::new(factories::sasl_authentication_schema())
                .with_services(AuthenticationFactoryProvider::SASL),
        );
        definitions.register(
            child("http-authentication-factory"),
            ResourceDefinition::new(factories::http_authentication_schema())
                .with_services(AuthenticationFactoryProvider::HTTP),
        );
    }
}

/// `/subsystem=elytron/<kind>=<name>`
#[must_use]
pub fn address(kind: &str, name: &str) -> PathAddress {
    PathAddress::subsystem(SUBSYSTEM).append(kind, name)
}

#[must_use]
pub fn properties_realm_address(name: &str) -> PathAddress {
    address("properties-realm", name)
}

#[must_use]
pub fn security_domain_address(name: &str) -> PathAddress {
    address("security-domain", name)
}

#[must_use]
pub fn sasl_authentication_factory_address(name: &str) -> PathAddress {
    address("sasl-authentication-factory", name)
}

#[must_use]
pub fn http_authentication_factory_address(name: &str) -> PathAddress {
    address("http-authentication-factory", name)
}

/// `add` for a properties realm reading `users` (and optionally `groups`).
#[must_use]
pub fn add_properties_realm(name: &str, users: &str, groups: Option<&str>, plain_text: bool) -> Operation {
    let mut attributes = vec![(
        "users-properties",
        ModelValue::object([("path", ModelValue::from(users)), ("plain-text", ModelValue::from(plain_text))]),
    )];
    if let Some(groups) = groups {
        attributes.push(("groups-properties", ModelValue::object([("path", groups)])));
    }
    Operation::add(properties_realm_address(name), attributes)
}

/// `add` for a security domain whose realms all share `role_decoder`.
#[must_use]
pub fn add_security_domain(name: &str, default_realm: &str, realms: &[&str], role_decoder: Option<&str>) -> Operation {
    let realms = realms.iter().map(|realm| {
        let mut entry = vec![("realm", ModelValue::from(*realm))];
        if let Some(decoder) = role_decoder {
            entry.push(("role-decoder", ModelValue::from(decoder)));
        }
        ModelValue::object(entry)
    });
    Operation::add(
        security_domain_address(name),
        [
            ("default-realm", ModelValue::from(default_realm)),
            ("permission-mapper", ModelValue::from(DEFAULT_PERMISSION_MAPPER)),
            ("realms", ModelValue::list(realms)),
        ],
    )
}

/// `add` for a SASL authentication factory over the default server factory.
#[must_use]
pub fn add_sasl_authentication_factory(name: &str, security_domain: &str, mechanisms: &[&str]) -> Operation {
    let mechanisms = mechanisms.iter().map(|m| ModelValue::object([("mechanism-name", *m)]));
    Operation::add(
        sasl_authentication_factory_address(name),
        [
            ("sasl-server-factory", ModelValue::from(DEFAULT_SASL_SERVER_FACTORY)),
            ("security-domain", ModelValue::from(security_domain)),
            ("mechanism-configurations", ModelValue::list(mechanisms)),
        ],
    )
}

/// `add` for an HTTP authentication factory; every mechanism advertises `realm_name`.
#[must_use]
pub fn add_http_authentication_factory(
    name: &str,
    security_domain: &str,
    mechanisms: &[&str],
    realm_name: &str,
) -> Operation {
    let mechanisms = mechanisms.iter().map(|m| {
        ModelValue::object([
            ("mechanism-name", ModelValue::from(*m)),
            (
                "mechanism-realm-configurations",
                ModelValue::list([ModelValue::object([("realm-name", realm_name)])]),
            ),
        ])
    });
    Operation::add(
        http_authentication_factory_address(name),
        [
            ("http-server-mechanism-factory", ModelValue::from(DEFAULT_HTTP_MECHANISM_FACTORY)),
            ("security-domain", ModelValue::from(security_domain)),
            ("mechanism-configurations", ModelValue::list(mechanisms)),
        ],
    )
}

/// The subsystem plus the mappers and mechanism factories other resources default to.
#[must_use]
pub fn default_operations() -> Vec<Operation> {
    let none = Vec::<(&str, ModelValue)>::new;
    vec![
        Operation::add(PathAddress::subsystem(SUBSYSTEM), none()),
        Operation::add(address("simple-permission-mapper", DEFAULT_PERMISSION_MAPPER), [("mapping-mode", "first")]),
        Operation::add(address("simple-role-decoder", GROUPS_TO_ROLES), [("attribute", "groups")]),
        Operation::add(
            address("configurable-sasl-server-factory", DEFAULT_SASL_SERVER_FACTORY),
            [("server-name", "localhost")],
        ),
        Operation::add(address("provider-http-server-mechanism-factory", DEFAULT_HTTP_MECHANISM_FACTORY), none()),
    ]
}
