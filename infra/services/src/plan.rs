use crate::capability::CapabilityDirectory;
use crate::definition::{Dependency, DependencyTarget, ServiceDefinition};
use crate::error::RegistryError;
use crate::graph::{self, DependencyView};
use crate::registry::Graph;
use capstan_domain::{CapabilityName, ServiceName, ServiceState};
use fxhash::FxHashMap;

/// A structural change to the registry, queued by the step that caused it.
#[derive(Debug, Clone)]
pub enum RuntimeAction {
    /// Register and start a new service.
    Install(ServiceDefinition),
    /// Stop and unregister a service.
    Remove(ServiceName),
    /// Swap a service's definition, restarting it if it is live.
    Replace(ServiceDefinition),
}

impl RuntimeAction {
    #[must_use]
    pub const fn service_name(&self) -> &ServiceName {
        match self {
            Self::Install(definition) | Self::Replace(definition) => definition.name(),
            Self::Remove(name) => name,
        }
    }
}

#[derive(Debug, Clone)]
struct PlannedService {
    dependencies: Vec<Dependency>,
    provides: Vec<CapabilityName>,
    state: ServiceState,
}

/// What the registry would look like after a batch of actions, without touching it.
///
/// Every [`push`](Self::push) is checked against the view as left by the actions before it,
/// so structural refusals are attributed to the action that caused them. Dependency
/// resolution is checked once the batch is complete by [`verify`](Self::verify), which lets
/// a batch add a service before the capability it requires.
#[derive(Debug)]
pub struct BatchPlan {
    base_version: u64,
    services: FxHashMap<ServiceName, PlannedService>,
    capabilities: CapabilityDirectory,
    actions: Vec<(usize, RuntimeAction)>,
}

impl BatchPlan {
    pub(crate) fn from_graph(graph: &Graph) -> Self {
        let services = graph
            .entries
            .iter()
            .map(|(name, entry)| {
                let planned = PlannedService {
                    dependencies: entry.definition.dependencies().to_vec(),
                    provides: entry.definition.provided_capabilities().to_vec(),
                    state: entry.state,
                };
                (name.clone(), planned)
            })
            .collect();
        Self {
            base_version: graph.version,
            services,
            capabilities: graph.capabilities.clone(),
            actions: Vec::new(),
        }
    }

    pub(crate) const fn base_version(&self) -> u64 {
        self.base_version
    }

    pub(crate) fn into_actions(self) -> Vec<(usize, RuntimeAction)> {
        self.actions
    }

    /// Validates `action` against the planned view and queues it under `origin`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateName`], [`RegistryError::NotRegistered`],
    /// [`RegistryError::StillDepended`], or [`RegistryError::CapabilityAlreadyProvided`].
    /// The plan is unchanged on error.
    pub fn push(&mut self, origin: usize, action: RuntimeAction) -> Result<(), RegistryError> {
        match &action {
            RuntimeAction::Install(definition) => {
                let name = definition.name();
                if self.services.contains_key(name) {
                    return Err(RegistryError::DuplicateName { name: name.clone() });
                }
                self.capabilities.check_available(definition.provided_capabilities(), name)?;
                self.define(definition, ServiceState::Defined)?;
            },
            RuntimeAction::Remove(name) => {
                if !self.services.contains_key(name) {
                    return Err(RegistryError::NotRegistered { name: name.clone() });
                }
                if let Some(dependent) = graph::hard_dependents(&*self, name).into_iter().next() {
                    return Err(RegistryError::StillDepended { name: name.clone(), dependent });
                }
                self.services.remove(name);
                self.capabilities.unpublish_all(name);
            },
            RuntimeAction::Replace(definition) => {
                let name = definition.name();
                let state = self
                    .services
                    .get(name)
                    .map(|s| s.state)
                    .ok_or_else(|| RegistryError::NotRegistered { name: name.clone() })?;
                self.capabilities.check_available(definition.provided_capabilities(), name)?;
                self.capabilities.unpublish_all(name);
                let state =
                    if state == ServiceState::Failed { ServiceState::Defined } else { state };
                self.define(definition, state)?;
            },
        }
        self.actions.push((origin, action));
        Ok(())
    }

    fn define(
        &mut self,
        definition: &ServiceDefinition,
        state: ServiceState,
    ) -> Result<(), RegistryError> {
        for capability in definition.provided_capabilities() {
            self.capabilities.publish(capability.clone(), definition.name().clone())?;
        }
        self.services.insert(
            definition.name().clone(),
            PlannedService {
                dependencies: definition.dependencies().to_vec(),
                provides: definition.provided_capabilities().to_vec(),
                state,
            },
        );
        Ok(())
    }

    /// Checks that every installed or replaced service can resolve its dependency closure.
    ///
    /// # Errors
    ///
    /// The origin of the first offending action with [`RegistryError::MissingDependency`],
    /// [`RegistryError::CyclicDependency`], or [`RegistryError::DependencyFailed`].
    pub fn verify(&self) -> Result<(), (usize, RegistryError)> {
        for (origin, action) in &self.actions {
            let name = match action {
                RuntimeAction::Install(definition) | RuntimeAction::Replace(definition) => {
                    definition.name()
                },
                RuntimeAction::Remove(_) => continue,
            };
            if !self.services.contains_key(name) {
                continue;
            }
            let order = graph::activation_order(self, name).map_err(|e| (*origin, e))?;
            let failed = order
                .iter()
                .filter(|member| *member != name)
                .find(|member| self.state(member) == Some(ServiceState::Failed));
            if let Some(dependency) = failed {
                return Err((
                    *origin,
                    RegistryError::DependencyFailed {
                        service: name.clone(),
                        dependency: dependency.clone(),
                    },
                ));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, name: &ServiceName) -> bool {
        self.services.contains_key(name)
    }

    /// Planned state: the current state for existing services, `DEFINED` for pending installs.
    #[must_use]
    pub fn service_state(&self, name: &ServiceName) -> Option<ServiceState> {
        self.services.get(name).map(|s| s.state)
    }

    #[must_use]
    pub fn provider_of(&self, capability: &CapabilityName) -> Option<&ServiceName> {
        self.capabilities.resolve(capability)
    }

    #[must_use]
    pub fn provides(&self, name: &ServiceName) -> Option<&[CapabilityName]> {
        self.services.get(name).map(|s| s.provides.as_slice())
    }

    #[must_use]
    pub fn actions(&self) -> &[(usize, RuntimeAction)] {
        &self.actions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl DependencyView for BatchPlan {
    fn names(&self) -> Vec<ServiceName> {
        self.services.keys().cloned().collect()
    }

    fn dependencies(&self, name: &ServiceName) -> Option<&[Dependency]> {
        self.services.get(name).map(|s| s.dependencies.as_slice())
    }

    fn resolve(&self, target: &DependencyTarget) -> Option<ServiceName> {
        match target {
            DependencyTarget::Service(name) => {
                self.services.contains_key(name).then(|| name.clone())
            },
            DependencyTarget::Capability(capability) => {
                self.capabilities.resolve(capability).cloned()
            },
        }
    }

    fn state(&self, name: &ServiceName) -> Option<ServiceState> {
        self.service_state(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ValueService;
    use crate::registry::ServiceRegistry;

    fn service(name: &str) -> ServiceDefinition {
        ServiceDefinition::new(name, ValueService::new(()))
    }

    #[test]
    fn dependencies_may_arrive_later_in_the_batch() {
        let registry = ServiceRegistry::new();
        let mut plan = registry.plan();
        plan.push(1, RuntimeAction::Install(service("domain").requires(Dependency::capability("realm"))))
            .unwrap();
        assert!(matches!(
            plan.verify(),
            Err((1, RegistryError::MissingDependency { .. }))
        ));

        plan.push(2, RuntimeAction::Install(service("realm").provides("realm"))).unwrap();
        plan.verify().unwrap();
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn refusals_leave_the_plan_unchanged() {
        let registry = ServiceRegistry::new();
        registry.register(service("realm").provides("realm")).unwrap();
        registry.register(service("domain").requires(Dependency::capability("realm"))).unwrap();

        let mut plan = registry.plan();
        let err = plan.push(3, RuntimeAction::Remove("realm".into())).unwrap_err();
        assert_eq!(
            err,
            RegistryError::StillDepended { name: "realm".into(), dependent: "domain".into() }
        );
        let err = plan.push(4, RuntimeAction::Install(service("other").provides("realm"))).unwrap_err();
        assert!(matches!(err, RegistryError::CapabilityAlreadyProvided { .. }));
        assert!(plan.is_empty());
        assert!(plan.contains(&"realm".into()));
        assert!(!plan.contains(&"other".into()));

        plan.push(5, RuntimeAction::Remove("domain".into())).unwrap();
        plan.push(6, RuntimeAction::Remove("realm".into())).unwrap();
        assert!(plan.provider_of(&"realm".into()).is_none());
        assert_eq!(registry.len(), 2);
    }
}
