use crate::address::PathAddress;
use crate::value::ModelValue;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::Display;

pub type Attributes = BTreeMap<String, ModelValue>;

/// Kind tag of an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OperationKind {
    Add,
    Remove,
    WriteAttribute,
}

/// A single model mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "kebab-case")]
pub enum Operation {
    Add {
        address: PathAddress,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: Attributes,
    },
    Remove {
        address: PathAddress,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        cascade: bool,
    },
    WriteAttribute {
        address: PathAddress,
        name: String,
        #[serde(default)]
        value: ModelValue,
    },
}

impl Operation {
    pub fn add<K, V>(address: PathAddress, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<ModelValue>,
    {
        Self::Add {
            address,
            attributes: attributes.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    #[must_use]
    pub const fn remove(address: PathAddress) -> Self {
        Self::Remove { address, cascade: false }
    }

    /// Removes the resource together with all of its descendants.
    #[must_use]
    pub const fn remove_recursive(address: PathAddress) -> Self {
        Self::Remove { address, cascade: true }
    }

    pub fn write_attribute(
        address: PathAddress,
        name: impl Into<String>,
        value: impl Into<ModelValue>,
    ) -> Self {
        Self::WriteAttribute { address, name: name.into(), value: value.into() }
    }

    #[must_use]
    pub const fn address(&self) -> &PathAddress {
        match self {
            Self::Add { address, .. }
            | Self::Remove { address, .. }
            | Self::WriteAttribute { address, .. } => address,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Add { .. } => OperationKind::Add,
            Self::Remove { .. } => OperationKind::Remove,
            Self::WriteAttribute { .. } => OperationKind::WriteAttribute,
        }
    }
}

bitflags! {
    /// Request-wide execution switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct OperationHeaders: u32 {
        /// Live services may be restarted to apply a change.
        const ALLOW_RESOURCE_SERVICE_RESTART = 1 << 0;
        /// Runtime activation failures are reported as request failures.
        const ROLLBACK_ON_RUNTIME_FAILURE = 1 << 1;
    }
}

impl Default for OperationHeaders {
    fn default() -> Self {
        Self::empty()
    }
}

/// Ordered batch of operations applied as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub steps: Vec<Operation>,
    #[serde(default)]
    pub headers: OperationHeaders,
}

impl CompositeRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn step(mut self, operation: Operation) -> Self {
        self.steps.push(operation);
        self
    }

    #[must_use]
    pub fn steps(mut self, operations: impl IntoIterator<Item = Operation>) -> Self {
        self.steps.extend(operations);
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: OperationHeaders) -> Self {
        self.headers |= headers;
        self
    }

    #[must_use]
    pub const fn allows_restart(&self) -> bool {
        self.headers.contains(OperationHeaders::ALLOW_RESOURCE_SERVICE_RESTART)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl From<Operation> for CompositeRequest {
    fn from(operation: Operation) -> Self {
        Self::new().step(operation)
    }
}

impl FromIterator<Operation> for CompositeRequest {
    fn from_iter<T: IntoIterator<Item = Operation>>(iter: T) -> Self {
        Self::new().steps(iter)
    }
}
