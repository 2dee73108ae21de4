use crate::capability_service;
use crate::mappers::{PermissionMapper, RoleDecoder};
use crate::realm::PropertiesRealm;
use capstan_controller::{ResolveContext, ServiceDefinitionProvider};
use capstan_domain::capabilities::{
    PERMISSION_MAPPER, ROLE_DECODER, SECURITY_DOMAIN, SECURITY_REALM, dynamic,
};
use capstan_domain::{ModelValue, PathAddress, ServiceName};
use capstan_model::{AttributeDefinition, AttributeViolation, ResourceSchema, RestartPolicy};
use capstan_services::{ActivationError, Dependency, FnService, ServiceDefinition, StartContext};
use std::collections::BTreeSet;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

const MAPPER_KEY: &str = "permission-mapper";

fn realm_key(realm: &str) -> String {
    format!("realm.{realm}")
}

fn decoder_key(decoder: &str) -> String {
    format!("role-decoder.{decoder}")
}

/// An authenticated identity with the roles its realm's decoder produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub realm: String,
    pub roles: Vec<String>,
}

pub struct DomainRealm {
    pub realm: Arc<PropertiesRealm>,
    pub role_decoder: Option<Arc<RoleDecoder>>,
}

impl Debug for DomainRealm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainRealm")
            .field("realm", &self.realm.name())
            .field("role_decoder", &self.role_decoder.as_ref().map(|d| d.name.as_str()))
            .finish()
    }
}

/// Realms and mappers combined into one place applications authenticate against.
#[derive(Debug)]
pub struct SecurityDomain {
    name: String,
    default_realm: String,
    realms: Vec<DomainRealm>,
    permission_mapper: Option<Arc<PermissionMapper>>,
}

impl SecurityDomain {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn default_realm(&self) -> &str {
        &self.default_realm
    }

    #[must_use]
    pub fn realms(&self) -> &[DomainRealm] {
        &self.realms
    }

    #[must_use]
    pub fn permission_mapper(&self) -> Option<&PermissionMapper> {
        self.permission_mapper.as_deref()
    }

    /// Looks `user` up in the default realm first, then in the remaining realms in order.
    #[must_use]
    pub fn identity(&self, user: &str) -> Option<Identity> {
        let default = self.realms.iter().filter(|r| r.realm.name() == self.default_realm);
        let others = self.realms.iter().filter(|r| r.realm.name() != self.default_realm);
        default.chain(others).find(|r| r.realm.contains(user)).map(|r| Identity {
            name: user.to_owned(),
            realm: r.realm.name().to_owned(),
            roles: r
                .role_decoder
                .as_ref()
                .map(|decoder| decoder.decode(&r.realm.attributes(user)))
                .unwrap_or_default(),
        })
    }
}

pub(crate) fn schema() -> ResourceSchema {
    let realm = AttributeDefinition::object(
        "realm",
        [
            AttributeDefinition::string("realm").required().references(SECURITY_REALM),
            AttributeDefinition::string("role-decoder").references(ROLE_DECODER),
        ],
    );
    ResourceSchema::new()
        .attribute(
            AttributeDefinition::string("default-realm")
                .required()
                .restart(RestartPolicy::ResourceServices),
        )
        .attribute(
            AttributeDefinition::string("permission-mapper")
                .references(PERMISSION_MAPPER)
                .restart(RestartPolicy::ResourceServices),
        )
        .attribute(
            AttributeDefinition::list("realms", realm)
                .required()
                .length(1, usize::MAX)
                .restart(RestartPolicy::ResourceServices),
        )
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RealmEntry {
    realm: String,
    role_decoder: Option<String>,
}

fn realm_entries(items: &[ModelValue]) -> Result<Vec<RealmEntry>, AttributeViolation> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let realm = item
                .get("realm")
                .and_then(ModelValue::as_str)
                .ok_or_else(|| AttributeViolation::new(format!("realms[{i}].realm"), "realm is required"))?;
            Ok(RealmEntry {
                realm: realm.to_owned(),
                role_decoder: item.get("role-decoder").and_then(ModelValue::as_str).map(str::to_owned),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SecurityDomainProvider;

impl ServiceDefinitionProvider for SecurityDomainProvider {
    fn service_name(&self, address: &PathAddress) -> ServiceName {
        capability_service(SECURITY_DOMAIN, address)
    }

    fn definition(&self, ctx: &ResolveContext<'_>) -> Result<ServiceDefinition, AttributeViolation> {
        let name = ctx.name().to_owned();
        let default_realm = ctx.string("default-realm")?;
        let entries = realm_entries(&ctx.list("realms"))?;
        if !entries.iter().any(|e| e.realm == default_realm) {
            return Err(AttributeViolation::new(
                "default-realm",
                format!("'{default_realm}' is not one of the domain's realms"),
            ));
        }

        let mut dependencies = Vec::new();
        let mut seen = BTreeSet::new();
        for entry in &entries {
            if seen.insert(realm_key(&entry.realm)) {
                dependencies.push(
                    Dependency::capability(dynamic(SECURITY_REALM, &entry.realm)).inject_as(realm_key(&entry.realm)),
                );
            }
            if let Some(decoder) = &entry.role_decoder
                && seen.insert(decoder_key(decoder))
            {
                dependencies
                    .push(Dependency::capability(dynamic(ROLE_DECODER, decoder)).inject_as(decoder_key(decoder)));
            }
        }
        if let Some(mapper) = ctx.optional_capability(PERMISSION_MAPPER, "permission-mapper") {
            dependencies.push(Dependency::capability(mapper).inject_as(MAPPER_KEY));
        }

        let service = FnService::new(move |start: &StartContext| -> Result<SecurityDomain, ActivationError> {
            let realms = entries
                .iter()
                .map(|entry| {
                    Ok(DomainRealm {
                        realm: start.get::<PropertiesRealm>(&realm_key(&entry.realm))?,
                        role_decoder: entry
                            .role_decoder
                            .as_deref()
                            .map(|decoder| start.get::<RoleDecoder>(&decoder_key(decoder)))
                            .transpose()?,
                    })
                })
                .collect::<Result<Vec<_>, ActivationError>>()?;
            Ok(SecurityDomain {
                name: name.clone(),
                default_realm: default_realm.clone(),
                realms,
                permission_mapper: start.optional::<PermissionMapper>(MAPPER_KEY),
            })
        });

        Ok(ServiceDefinition::new(self.service_name(ctx.address()), service)
            .requires_all(dependencies)
            .provides(dynamic(SECURITY_DOMAIN, ctx.name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realm_entries_keep_declaration_order() {
        let items = [
            ModelValue::object([("realm", "ApplicationRealm"), ("role-decoder", "groups-to-roles")]),
            ModelValue::object([("realm", "local")]),
        ];
        let entries = realm_entries(&items).unwrap();
        assert_eq!(entries[0].realm, "ApplicationRealm");
        assert_eq!(entries[0].role_decoder.as_deref(), Some("groups-to-roles"));
        assert_eq!(entries[1].role_decoder, None);
    }

    #[test]
    fn entries_without_realm_are_reported_by_index() {
        let items = [ModelValue::object([("realm", "a")]), ModelValue::object([("role-decoder", "b")])];
        assert_eq!(realm_entries(&items).unwrap_err().attribute, "realms[1].realm");
    }
}
