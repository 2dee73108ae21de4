use crate::error::ModelError;
use crate::resource::Resource;
use crate::schema::{ResourceSchema, SchemaProvider};
use capstan_domain::{Attributes, ModelValue, PathAddress};
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::ops::{Bound, Deref};
use std::sync::Arc;
use tracing::trace;

static ROOT: Resource = Resource::new(PathAddress::root(), Attributes::new());

type Tree = BTreeMap<PathAddress, Resource>;

/// Immutable, versioned view of the configuration tree. Cloning is cheap.
#[derive(Clone)]
pub struct ModelSnapshot {
    version: u64,
    resources: Arc<Tree>,
    schemas: Arc<dyn SchemaProvider>,
}

impl Debug for ModelSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSnapshot")
            .field("version", &self.version)
            .field("resources", &self.resources.len())
            .finish_non_exhaustive()
    }
}

impl PartialEq for ModelSnapshot {
    /// Equal when both hold the same resources with the same attributes, whatever the version.
    fn eq(&self, other: &Self) -> bool {
        self.resources == other.resources
    }
}

impl ModelSnapshot {
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Number of resources, not counting the implicit root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[must_use]
    pub fn contains(&self, address: &PathAddress) -> bool {
        address.is_root() || self.resources.contains_key(address)
    }

    pub fn get(&self, address: &PathAddress) -> Result<&Resource, ModelError> {
        if address.is_root() {
            return Ok(&ROOT);
        }
        self.resources.get(address).ok_or_else(|| ModelError::NotFound { address: address.clone() })
    }

    /// All resources in address order (parents before children).
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    /// Every resource below `address`, parents before children.
    pub fn descendants<'a>(&'a self, address: &'a PathAddress) -> impl Iterator<Item = &'a Resource> {
        self.resources
            .range((Bound::Excluded(address.clone()), Bound::Unbounded))
            .take_while(move |(key, _)| address.is_prefix_of(key))
            .map(|(_, resource)| resource)
    }

    pub fn children<'a>(&'a self, address: &'a PathAddress) -> impl Iterator<Item = &'a Resource> {
        self.descendants(address).filter(move |r| address.is_parent_of(r.address()))
    }

    pub fn schema_for(&self, address: &PathAddress) -> Result<Arc<ResourceSchema>, ModelError> {
        self.schemas
            .schema_for(address)
            .ok_or_else(|| ModelError::UnknownResourceType { address: address.clone() })
    }

    /// Attribute value with the schema default applied.
    pub fn resolve_attribute(&self, address: &PathAddress, name: &str) -> Result<ModelValue, ModelError> {
        let resource = self.get(address)?;
        Ok(self.schema_for(address)?.resolve(resource.attributes(), name))
    }

    /// Object view of a resource in the management `read-resource` shape.
    ///
    /// Children appear under their key as `{ name: {...} }`; without `recursive` each child
    /// maps to undefined. `include_defaults` fills unset attributes from the schema.
    pub fn read_resource(
        &self,
        address: &PathAddress,
        recursive: bool,
        include_defaults: bool,
    ) -> Result<ModelValue, ModelError> {
        let resource = self.get(address)?;
        let mut object: BTreeMap<String, ModelValue> = if include_defaults && !address.is_root() {
            let schema = self.schema_for(address)?;
            schema
                .attributes()
                .iter()
                .map(|d| (d.name().to_owned(), schema.resolve(resource.attributes(), d.name())))
                .collect()
        } else {
            resource.attributes().clone()
        };

        for child in self.children(address) {
            let Some(element) = child.address().last() else { continue };
            let value = if recursive {
                self.read_resource(child.address(), true, include_defaults)?
            } else {
                ModelValue::Undefined
            };
            let group = object
                .entry(element.key.clone())
                .or_insert_with(|| ModelValue::Object(BTreeMap::new()));
            if let ModelValue::Object(map) = group {
                map.insert(element.value.clone(), value);
            }
        }
        Ok(ModelValue::Object(object))
    }

    /// Same resource set and attributes as `other`.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self == other
    }
}

/// Mutable owner of the configuration tree.
///
/// Mutations copy the tree on write, so snapshots handed out earlier never change.
/// Every successful mutation bumps the version. Adds and writes are validated against the
/// [`SchemaProvider`] given at construction.
#[derive(Clone, Debug)]
pub struct ConfigurationModel {
    state: ModelSnapshot,
}

impl Deref for ConfigurationModel {
    type Target = ModelSnapshot;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

impl ConfigurationModel {
    pub fn new(schemas: Arc<dyn SchemaProvider>) -> Self {
        Self { state: ModelSnapshot { version: 0, resources: Arc::default(), schemas } }
    }

    #[must_use]
    pub fn snapshot(&self) -> ModelSnapshot {
        self.state.clone()
    }

    /// Creates a resource under an existing parent.
    pub fn add(&mut self, address: &PathAddress, attributes: &Attributes) -> Result<(), ModelError> {
        if self.contains(address) {
            return Err(ModelError::DuplicateResource { address: address.clone() });
        }
        if !address.parent().is_some_and(|parent| self.contains(&parent)) {
            return Err(ModelError::NoSuchParent { address: address.clone() });
        }
        let attributes = self
            .schema_for(address)?
            .validate_add(attributes)
            .map_err(|violation| violation.at(address))?;

        trace!(%address, "Adding resource");
        self.tree().insert(address.clone(), Resource::new(address.clone(), attributes));
        self.bump();
        Ok(())
    }

    /// Deletes a resource; with `cascade`, its whole subtree too.
    ///
    /// Returns the removed resources parent-first so they can be re-added in order.
    pub fn remove(&mut self, address: &PathAddress, cascade: bool) -> Result<Vec<Resource>, ModelError> {
        if address.is_root() {
            return Err(ModelError::RootResource);
        }
        if !self.resources.contains_key(address) {
            return Err(ModelError::NotFound { address: address.clone() });
        }
        let doomed: Vec<PathAddress> = std::iter::once(address.clone())
            .chain(self.descendants(address).map(|r| r.address().clone()))
            .collect();
        if !cascade && doomed.len() > 1 {
            return Err(ModelError::HasChildren { address: address.clone(), children: doomed.len() - 1 });
        }

        trace!(%address, count = doomed.len(), "Removing resource");
        let tree = self.tree();
        let removed = doomed.iter().filter_map(|a| tree.remove(a)).collect();
        self.bump();
        Ok(removed)
    }

    /// Sets (or, with an undefined value, clears) one attribute and returns the prior value.
    pub fn write_attribute(
        &mut self,
        address: &PathAddress,
        name: &str,
        value: &ModelValue,
    ) -> Result<ModelValue, ModelError> {
        if !self.contains(address) {
            return Err(ModelError::NotFound { address: address.clone() });
        }
        let value = self
            .schema_for(address)?
            .validate_write(name, value)
            .map_err(|violation| violation.at(address))?;

        let resource = self
            .tree()
            .get_mut(address)
            .ok_or_else(|| ModelError::NotFound { address: address.clone() })?;
        let previous = resource.set(name, value);
        trace!(%address, attribute = name, "Attribute written");
        self.bump();
        Ok(previous)
    }

    fn tree(&mut self) -> &mut Tree {
        Arc::make_mut(&mut self.state.resources)
    }

    const fn bump(&mut self) {
        self.state.version += 1;
    }
}
