use crate::context::ResolveContext;
use capstan_domain::{AddressPattern, PathAddress, ServiceName};
use capstan_model::{AttributeViolation, PatternTable, ResourceSchema, SchemaProvider};
use capstan_services::ServiceDefinition;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Builds the runtime service behind a resource type.
pub trait ServiceDefinitionProvider: Send + Sync {
    /// Name of the service backing the resource at `address`. Must not depend on attributes,
    /// since it is also used after the resource is gone.
    fn service_name(&self, address: &PathAddress) -> ServiceName;

    /// Service definition for the resource as it currently stands in the model.
    fn definition(&self, ctx: &ResolveContext<'_>) -> Result<ServiceDefinition, AttributeViolation>;
}

/// Schema and runtime behavior of one resource type.
#[derive(Clone)]
pub struct ResourceDefinition {
    schema: Arc<ResourceSchema>,
    services: Option<Arc<dyn ServiceDefinitionProvider>>,
    boot_only: bool,
}

impl ResourceDefinition {
    pub fn new(schema: ResourceSchema) -> Self {
        Self { schema: Arc::new(schema), services: None, boot_only: false }
    }

    #[must_use]
    pub fn with_services(mut self, provider: impl ServiceDefinitionProvider + 'static) -> Self {
        self.services = Some(Arc::new(provider));
        self
    }

    /// Runtime changes only happen during boot; later edits flag the container for reload.
    #[must_use]
    pub const fn boot_only(mut self) -> Self {
        self.boot_only = true;
        self
    }

    #[must_use]
    pub const fn schema(&self) -> &Arc<ResourceSchema> {
        &self.schema
    }

    #[must_use]
    pub fn services(&self) -> Option<&dyn ServiceDefinitionProvider> {
        self.services.as_deref()
    }

    #[must_use]
    pub const fn is_boot_only(&self) -> bool {
        self.boot_only
    }
}

impl Debug for ResourceDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDefinition")
            .field("attributes", &self.schema.attributes().len())
            .field("services", &self.services.is_some())
            .field("boot_only", &self.boot_only)
            .finish()
    }
}

/// Every resource type the container knows, keyed by address pattern.
#[derive(Debug, Clone, Default)]
pub struct ResourceDefinitionRegistry {
    table: PatternTable<ResourceDefinition>,
}

impl ResourceDefinitionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource type, returning the definition it replaced.
    pub fn register(
        &mut self,
        pattern: AddressPattern,
        definition: ResourceDefinition,
    ) -> Option<ResourceDefinition> {
        self.table.insert(pattern, definition)
    }

    #[must_use]
    pub fn lookup(&self, address: &PathAddress) -> Option<&ResourceDefinition> {
        self.table.lookup(address)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &AddressPattern> {
        self.table.iter().map(|(pattern, _)| pattern)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SchemaProvider for ResourceDefinitionRegistry {
    fn schema_for(&self, address: &PathAddress) -> Option<Arc<ResourceSchema>> {
        self.lookup(address).map(|definition| definition.schema.clone())
    }
}
