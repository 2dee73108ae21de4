use capstan_domain::{Attributes, ModelValue, PathAddress};
use serde::Serialize;

static UNDEFINED: ModelValue = ModelValue::Undefined;

/// One configuration node: its address and the attributes explicitly set on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    address: PathAddress,
    attributes: Attributes,
}

impl Resource {
    #[must_use]
    pub const fn new(address: PathAddress, attributes: Attributes) -> Self {
        Self { address, attributes }
    }

    #[must_use]
    pub const fn address(&self) -> &PathAddress {
        &self.address
    }

    #[must_use]
    pub const fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Explicitly set value, or undefined. Schema defaults are not applied here.
    #[must_use]
    pub fn get(&self, name: &str) -> &ModelValue {
        self.attributes.get(name).unwrap_or(&UNDEFINED)
    }

    pub(crate) fn set(&mut self, name: &str, value: ModelValue) -> ModelValue {
        if value.is_defined() {
            self.attributes.insert(name.to_owned(), value)
        } else {
            self.attributes.remove(name)
        }
        .unwrap_or_default()
    }
}
