use crate::capability_service;
use capstan_controller::{ResolveContext, ServiceDefinitionProvider};
use capstan_domain::capabilities::{PERMISSION_MAPPER, ROLE_DECODER, dynamic};
use capstan_domain::{PathAddress, ServiceName};
use capstan_model::{AttributeDefinition, AttributeViolation, ResourceSchema, RestartPolicy};
use capstan_services::{ServiceDefinition, ValueService};
use std::collections::BTreeMap;

/// Turns an identity attribute into roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDecoder {
    pub name: String,
    pub attribute: String,
}

impl RoleDecoder {
    #[must_use]
    pub fn decode(&self, attributes: &BTreeMap<String, Vec<String>>) -> Vec<String> {
        attributes.get(&self.attribute).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMapper {
    pub name: String,
    pub mapping_mode: String,
}

pub(crate) fn role_decoder_schema() -> ResourceSchema {
    ResourceSchema::new()
        .attribute(AttributeDefinition::string("attribute").required().restart(RestartPolicy::ResourceServices))
}

pub(crate) fn permission_mapper_schema() -> ResourceSchema {
    ResourceSchema::new().attribute(
        AttributeDefinition::string("mapping-mode")
            .one_of(["and", "first", "or", "unless", "xor"])
            .default_value("first")
            .restart(RestartPolicy::ResourceServices),
    )
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RoleDecoderProvider;

impl ServiceDefinitionProvider for RoleDecoderProvider {
    fn service_name(&self, address: &PathAddress) -> ServiceName {
        capability_service(ROLE_DECODER, address)
    }

    fn definition(&self, ctx: &ResolveContext<'_>) -> Result<ServiceDefinition, AttributeViolation> {
        let decoder = RoleDecoder { name: ctx.name().to_owned(), attribute: ctx.string("attribute")? };
        Ok(ServiceDefinition::new(self.service_name(ctx.address()), ValueService::new(decoder))
            .provides(dynamic(ROLE_DECODER, ctx.name())))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PermissionMapperProvider;

impl ServiceDefinitionProvider for PermissionMapperProvider {
    fn service_name(&self, address: &PathAddress) -> ServiceName {
        capability_service(PERMISSION_MAPPER, address)
    }

    fn definition(&self, ctx: &ResolveContext<'_>) -> Result<ServiceDefinition, AttributeViolation> {
        let mapper = PermissionMapper {
            name: ctx.name().to_owned(),
            mapping_mode: ctx.string("mapping-mode")?,
        };
        Ok(ServiceDefinition::new(self.service_name(ctx.address()), ValueService::new(mapper))
            .provides(dynamic(PERMISSION_MAPPER, ctx.name())))
    }
}
