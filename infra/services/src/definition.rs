use crate::error::ActivationError;
use async_trait::async_trait;
use capstan_domain::{CapabilityName, ServiceName};
use fxhash::FxHashMap;
use std::any::Any;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

/// Runtime value produced by a started service and injected into its dependents.
pub type ServiceValue = Arc<dyn Any + Send + Sync>;

/// Start and stop logic of a runtime service.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    async fn start(&self, ctx: &StartContext) -> Result<ServiceValue, ActivationError>;

    async fn stop(&self, _value: ServiceValue) -> Result<(), ActivationError> {
        Ok(())
    }
}

/// A service whose runtime value is known up front.
#[derive(Debug)]
pub struct ValueService<T>(Arc<T>);

impl<T: Any + Send + Sync> ValueService<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(value))
    }
}

#[async_trait]
impl<T: Any + Send + Sync> Service for ValueService<T> {
    async fn start(&self, _ctx: &StartContext) -> Result<ServiceValue, ActivationError> {
        Ok(self.0.clone())
    }
}

/// A service whose value is assembled from its injected dependencies when it starts.
pub struct FnService<F>(F);

impl<F> FnService<F> {
    pub const fn new(build: F) -> Self {
        Self(build)
    }
}

impl<F> Debug for FnService<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnService").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, T> Service for FnService<F>
where
    F: Fn(&StartContext) -> Result<T, ActivationError> + Send + Sync + 'static,
    T: Any + Send + Sync,
{
    async fn start(&self, ctx: &StartContext) -> Result<ServiceValue, ActivationError> {
        (self.0)(ctx).map(|value| Arc::new(value) as ServiceValue)
    }
}

/// What a starting service sees: its own name and the values of its dependencies.
#[derive(Default)]
pub struct StartContext {
    name: Option<ServiceName>,
    injections: FxHashMap<String, ServiceValue>,
}

impl StartContext {
    pub(crate) fn new(name: ServiceName, injections: FxHashMap<String, ServiceValue>) -> Self {
        Self { name: Some(name), injections }
    }

    #[must_use]
    pub fn name(&self) -> Option<&ServiceName> {
        self.name.as_ref()
    }

    /// Value of a required dependency.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::Injection`] if nothing was injected under `key` or the value
    /// has a different type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, ActivationError> {
        self.optional(key).ok_or_else(|| ActivationError::Injection { key: key.to_owned() })
    }

    /// Value of an optional dependency, if it resolved and came up.
    #[must_use]
    pub fn optional<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.injections.get(key).cloned().and_then(|value| value.downcast::<T>().ok())
    }

    #[must_use]
    pub fn is_injected(&self, key: &str) -> bool {
        self.injections.contains_key(key)
    }
}

impl Debug for StartContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartContext")
            .field("name", &self.name)
            .field("injections", &self.injections.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Either a concrete service or whichever service provides a capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DependencyTarget {
    Service(ServiceName),
    Capability(CapabilityName),
}

impl Display for DependencyTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(name) => write!(f, "service {name}"),
            Self::Capability(name) => write!(f, "capability {name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    target: DependencyTarget,
    optional: bool,
    inject_as: String,
}

impl Dependency {
    pub fn service(name: impl Into<ServiceName>) -> Self {
        let name = name.into();
        Self { inject_as: name.to_string(), target: DependencyTarget::Service(name), optional: false }
    }

    pub fn capability(name: impl Into<CapabilityName>) -> Self {
        let name = name.into();
        Self {
            inject_as: name.to_string(),
            target: DependencyTarget::Capability(name),
            optional: false,
        }
    }

    /// Activation proceeds without this dependency when nothing provides it.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Key under which the dependency's value is handed to [`StartContext::get`].
    #[must_use]
    pub fn inject_as(mut self, key: impl Into<String>) -> Self {
        self.inject_as = key.into();
        self
    }

    #[must_use]
    pub const fn target(&self) -> &DependencyTarget {
        &self.target
    }

    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.inject_as
    }
}

/// A named unit of runtime functionality, its dependencies, and the capabilities it publishes.
#[derive(Clone)]
pub struct ServiceDefinition {
    name: ServiceName,
    dependencies: Vec<Dependency>,
    provides: Vec<CapabilityName>,
    service: Arc<dyn Service>,
}

impl ServiceDefinition {
    pub fn new(name: impl Into<ServiceName>, service: impl Service) -> Self {
        Self::from_arc(name, Arc::new(service))
    }

    pub fn from_arc(name: impl Into<ServiceName>, service: Arc<dyn Service>) -> Self {
        Self { name: name.into(), dependencies: Vec::new(), provides: Vec::new(), service }
    }

    #[must_use]
    pub fn requires(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    #[must_use]
    pub fn requires_all(mut self, dependencies: impl IntoIterator<Item = Dependency>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    #[must_use]
    pub fn provides(mut self, capability: impl Into<CapabilityName>) -> Self {
        let capability = capability.into();
        if !self.provides.contains(&capability) {
            self.provides.push(capability);
        }
        self
    }

    #[must_use]
    pub const fn name(&self) -> &ServiceName {
        &self.name
    }

    #[must_use]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    #[must_use]
    pub fn provided_capabilities(&self) -> &[CapabilityName] {
        &self.provides
    }

    pub(crate) fn service(&self) -> Arc<dyn Service> {
        self.service.clone()
    }
}

impl Debug for ServiceDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("provides", &self.provides)
            .finish_non_exhaustive()
    }
}
