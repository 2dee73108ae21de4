use capstan_domain::capabilities::dynamic;
use capstan_domain::{CapabilityName, ModelValue, PathAddress};
use capstan_model::{AttributeViolation, ModelSnapshot, Resource, ResourceSchema};
use std::collections::BTreeMap;

/// Read access to one resource while its service definition is being built.
///
/// Accessors apply schema defaults, so providers see the effective configuration.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    resource: &'a Resource,
    schema: &'a ResourceSchema,
    model: &'a ModelSnapshot,
}

impl<'a> ResolveContext<'a> {
    #[must_use]
    pub const fn new(
        resource: &'a Resource,
        schema: &'a ResourceSchema,
        model: &'a ModelSnapshot,
    ) -> Self {
        Self { resource, schema, model }
    }

    #[must_use]
    pub const fn address(&self) -> &'a PathAddress {
        self.resource.address()
    }

    /// Value of the last address element, e.g. `default` for `.../context-service=default`.
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.resource.address().name().unwrap_or_default()
    }

    #[must_use]
    pub const fn resource(&self) -> &'a Resource {
        self.resource
    }

    /// The whole model, for providers that need to look at other resources.
    #[must_use]
    pub const fn model(&self) -> &'a ModelSnapshot {
        self.model
    }

    /// Effective value: stored, else default, else undefined.
    #[must_use]
    pub fn value(&self, name: &str) -> ModelValue {
        self.schema.resolve(self.resource.attributes(), name)
    }

    pub fn string(&self, name: &str) -> Result<String, AttributeViolation> {
        self.optional_string(name).ok_or_else(|| missing(name))
    }

    #[must_use]
    pub fn optional_string(&self, name: &str) -> Option<String> {
        self.value(name).as_str().map(str::to_owned)
    }

    pub fn int(&self, name: &str) -> Result<i32, AttributeViolation> {
        self.optional_int(name).ok_or_else(|| missing(name))
    }

    #[must_use]
    pub fn optional_int(&self, name: &str) -> Option<i32> {
        self.value(name).as_i32()
    }

    pub fn long(&self, name: &str) -> Result<i64, AttributeViolation> {
        self.value(name).as_i64().ok_or_else(|| missing(name))
    }

    pub fn boolean(&self, name: &str) -> Result<bool, AttributeViolation> {
        self.value(name).as_bool().ok_or_else(|| missing(name))
    }

    /// List elements; empty when undefined.
    #[must_use]
    pub fn list(&self, name: &str) -> Vec<ModelValue> {
        self.value(name).as_list().map(<[ModelValue]>::to_vec).unwrap_or_default()
    }

    #[must_use]
    pub fn object(&self, name: &str) -> Option<BTreeMap<String, ModelValue>> {
        self.value(name).as_object().cloned()
    }

    /// Dynamic capability named by a string attribute: `<base>.<value>`.
    pub fn capability(&self, base: &str, name: &str) -> Result<CapabilityName, AttributeViolation> {
        self.string(name).map(|value| dynamic(base, &value))
    }

    #[must_use]
    pub fn optional_capability(&self, base: &str, name: &str) -> Option<CapabilityName> {
        self.optional_string(name).map(|value| dynamic(base, &value))
    }
}

fn missing(name: &str) -> AttributeViolation {
    AttributeViolation::new(name, "attribute is undefined and has no default")
}
