use capstan_domain::PathAddress;
use std::borrow::Cow;

/// Failures of configuration model operations. Nothing is mutated when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Resource {address} not found")]
    NotFound { address: PathAddress },

    #[error("Resource {address} already exists")]
    DuplicateResource { address: PathAddress },

    #[error("Cannot add {address}: parent resource does not exist")]
    NoSuchParent { address: PathAddress },

    #[error("Cannot remove {address}: it has {children} child resource(s)")]
    HasChildren { address: PathAddress, children: usize },

    #[error("No resource definition is registered for {address}")]
    UnknownResourceType { address: PathAddress },

    #[error("The root resource cannot be removed")]
    RootResource,

    #[error("Invalid attribute '{attribute}' of {address}: {reason}")]
    InvalidAttribute { address: PathAddress, attribute: String, reason: Cow<'static, str> },
}

impl ModelError {
    /// Value-level failure, as opposed to a tree-structure failure.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidAttribute { .. })
    }
}

/// A single attribute that failed schema validation, before it is tied to an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeViolation {
    pub attribute: String,
    pub reason: Cow<'static, str>,
}

impl AttributeViolation {
    pub fn new(attribute: impl Into<String>, reason: impl Into<Cow<'static, str>>) -> Self {
        Self { attribute: attribute.into(), reason: reason.into() }
    }

    #[must_use]
    pub fn at(self, address: &PathAddress) -> ModelError {
        ModelError::InvalidAttribute {
            address: address.clone(),
            attribute: self.attribute,
            reason: self.reason,
        }
    }

    /// Prefixes the attribute path, e.g. `path` inside `users-properties`.
    #[must_use]
    pub fn nested_in(self, parent: &str) -> Self {
        Self { attribute: format!("{parent}.{}", self.attribute), reason: self.reason }
    }
}
