use crate::capability::CapabilityDirectory;
use crate::definition::{
    Dependency, DependencyTarget, Service, ServiceDefinition, ServiceValue, StartContext,
};
use crate::error::{ActivationError, CommitError, RegistryError};
use crate::graph::{self, DependencyView};
use crate::handle::{CancelSignal, ServiceHandle, StartHandle};
use crate::plan::{BatchPlan, RuntimeAction};
use crate::verification::VerificationHandle;
use capstan_domain::events::ServiceTransition;
use capstan_domain::{CapabilityName, ServiceName, ServiceState};
use capstan_event_bus::EventBus;
use chrono::Utc;
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub(crate) struct Entry {
    pub(crate) definition: ServiceDefinition,
    pub(crate) state: ServiceState,
    value: Option<ServiceValue>,
    failure: Option<ActivationError>,
    status: watch::Sender<ServiceState>,
    cancel: Arc<CancelSignal>,
    generation: u64,
}

#[derive(Default)]
pub(crate) struct Graph {
    pub(crate) entries: FxHashMap<ServiceName, Entry>,
    pub(crate) capabilities: CapabilityDirectory,
    pub(crate) version: u64,
}

impl DependencyView for Graph {
    fn names(&self) -> Vec<ServiceName> {
        self.entries.keys().cloned().collect()
    }

    fn dependencies(&self, name: &ServiceName) -> Option<&[Dependency]> {
        self.entries.get(name).map(|e| e.definition.dependencies())
    }

    fn resolve(&self, target: &DependencyTarget) -> Option<ServiceName> {
        match target {
            DependencyTarget::Service(name) => self.entries.contains_key(name).then(|| name.clone()),
            DependencyTarget::Capability(capability) => {
                self.capabilities.resolve(capability).cloned()
            },
        }
    }

    fn state(&self, name: &ServiceName) -> Option<ServiceState> {
        self.entries.get(name).map(|e| e.state)
    }
}

struct Shared {
    graph: Mutex<Graph>,
    events: Option<EventBus>,
}

impl Shared {
    fn transition(&self, name: &ServiceName, entry: &mut Entry, to: ServiceState) {
        let from = entry.state;
        if from == to {
            return;
        }
        if !from.can_transition_to(to) {
            warn!(service = %name, %from, %to, "Ignoring illegal service transition");
            return;
        }
        entry.state = to;
        entry.status.send_replace(to);
        debug!(service = %name, %from, %to, "Service transition");
        if let Some(events) = &self.events {
            events.publish(ServiceTransition { service: name.clone(), from, to, at: Utc::now() });
        }
    }
}

/// Snapshot of one registered service.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub name: ServiceName,
    pub state: ServiceState,
    pub dependencies: Vec<Dependency>,
    pub provides: Vec<CapabilityName>,
}

/// Owns every runtime service and drives their lifecycles.
///
/// Cheap to clone; all clones share the same graph. Structural changes (`register`,
/// `remove`, `replace`) are serialized by an internal lock, and activation runs on spawned
/// tokio tasks, so `start` must be called from within a runtime.
#[derive(Clone)]
pub struct ServiceRegistry {
    shared: Arc<Shared>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ServiceRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let graph = self.shared.graph.lock();
        f.debug_struct("ServiceRegistry")
            .field("services", &graph.entries.len())
            .field("capabilities", &graph.capabilities.len())
            .field("version", &graph.version)
            .finish()
    }
}

enum Readiness {
    Ready,
    Abandoned,
    Failed(ServiceName),
    /// A dependency that was stopping when `start` was called is down now and needs
    /// starting again.
    Restart(ServiceName),
}

enum StopStep {
    Done,
    Wait(watch::Receiver<ServiceState>),
    Stop(Arc<dyn Service>, ServiceValue),
}

struct DependencyWatch {
    target: ServiceName,
    optional: bool,
    rx: watch::Receiver<ServiceState>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Publishes a [`ServiceTransition`] on `events` for every state change.
    #[must_use]
    pub fn with_events(events: EventBus) -> Self {
        Self::build(Some(events))
    }

    fn build(events: Option<EventBus>) -> Self {
        Self { shared: Arc::new(Shared { graph: Mutex::new(Graph::default()), events }) }
    }

    /// Adds a service in `DEFINED` and publishes its capabilities. Atomic.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateName`] or [`RegistryError::CapabilityAlreadyProvided`].
    pub fn register(&self, definition: ServiceDefinition) -> Result<ServiceHandle, RegistryError> {
        let mut guard = self.shared.graph.lock();
        let graph = &mut *guard;
        let name = definition.name().clone();
        if graph.entries.contains_key(&name) {
            return Err(RegistryError::DuplicateName { name });
        }
        graph.capabilities.check_available(definition.provided_capabilities(), &name)?;
        for capability in definition.provided_capabilities() {
            graph.capabilities.publish(capability.clone(), name.clone())?;
        }

        let (status, rx) = watch::channel(ServiceState::Defined);
        graph.entries.insert(
            name.clone(),
            Entry {
                definition,
                state: ServiceState::Defined,
                value: None,
                failure: None,
                status,
                cancel: Arc::new(CancelSignal::new()),
                generation: 0,
            },
        );
        graph.version += 1;
        debug!(service = %name, "Service registered");
        Ok(ServiceHandle::new(name, rx))
    }

    /// Registers and immediately starts a service. The service stays registered in
    /// `DEFINED` when the start request is refused.
    ///
    /// # Errors
    ///
    /// Any [`register`](Self::register) or [`start`](Self::start) error.
    pub fn install(&self, definition: ServiceDefinition) -> Result<StartHandle, RegistryError> {
        let name = definition.name().clone();
        self.register(definition)?;
        self.start(&name)
    }

    /// Begins activating `name` and everything it transitively requires, dependencies first.
    ///
    /// The whole dependency closure is checked before any state changes: a missing required
    /// dependency, a cycle, or a failed member refuses the request and leaves every service
    /// where it was.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRegistered`], [`RegistryError::MissingDependency`],
    /// [`RegistryError::CyclicDependency`], [`RegistryError::DependencyFailed`], or
    /// [`RegistryError::ServiceFailed`].
    pub fn start(&self, name: &ServiceName) -> Result<StartHandle, RegistryError> {
        let mut spawned = Vec::new();
        let handle = {
            let mut guard = self.shared.graph.lock();
            let graph = &mut *guard;
            let order = graph::activation_order(&*graph, name)?;
            if graph.state(name) == Some(ServiceState::Failed) {
                return Err(RegistryError::ServiceFailed { name: name.clone() });
            }
            if let Some(failed) =
                order.iter().find(|n| graph.state(n) == Some(ServiceState::Failed))
            {
                return Err(RegistryError::DependencyFailed {
                    service: name.clone(),
                    dependency: failed.clone(),
                });
            }

            // Members still stopping are started again once their stop completes.
            let stopping: Vec<ServiceName> = order
                .iter()
                .filter(|n| graph.state(n) == Some(ServiceState::Stopping))
                .cloned()
                .collect();
            for member in &order {
                let Some(entry) = graph.entries.get_mut(member) else { continue };
                if entry.state == ServiceState::Defined {
                    entry.generation += 1;
                    entry.cancel = Arc::new(CancelSignal::new());
                    self.shared.transition(member, entry, ServiceState::DependenciesResolving);
                    spawned.push((member.clone(), entry.generation, stopping.clone()));
                }
            }

            let entry = graph
                .entries
                .get(name)
                .ok_or_else(|| RegistryError::NotRegistered { name: name.clone() })?;
            StartHandle::new(self.clone(), name.clone(), entry.status.subscribe(), entry.cancel.clone())
        };

        for (member, generation, stopping) in spawned {
            tokio::spawn(activate(self.clone(), member, generation, stopping));
        }
        Ok(handle)
    }

    /// Stops `name` after every service that requires it, dependents first. Stopped
    /// services return to `DEFINED`. Returns the services that were stopped, in stop order.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRegistered`], or the first [`RegistryError::Activation`] raised by
    /// a stop call. A service whose stop fails ends in `FAILED`; the rest are still stopped.
    pub async fn stop(&self, name: &ServiceName) -> Result<Vec<ServiceName>, RegistryError> {
        let order: Vec<ServiceName> = {
            let graph = self.shared.graph.lock();
            if !graph.entries.contains_key(name) {
                return Err(RegistryError::NotRegistered { name: name.clone() });
            }
            graph::stop_order(&*graph, name)
                .into_iter()
                .filter(|n| {
                    graph.state(n).is_some_and(|s| s.is_active() || s == ServiceState::Stopping)
                })
                .collect()
        };

        let mut first_error = None;
        for member in &order {
            if let Err(e) = self.stop_one(member).await {
                warn!(service = %member, error = %e, "Service did not stop cleanly");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(order), Err)
    }

    /// Stops and unregisters `name`, unpublishing its capabilities.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRegistered`] or [`RegistryError::StillDepended`] when another
    /// registered service holds a required dependency on it.
    pub async fn remove(&self, name: &ServiceName) -> Result<(), RegistryError> {
        self.ensure_removable(name)?;
        let was_up = self.state(name) == Some(ServiceState::Up);
        if let Err(e) = self.stop_one(name).await {
            warn!(service = %name, error = %e, "Removing a service that failed to stop");
        }

        let mut guard = self.shared.graph.lock();
        let graph = &mut *guard;
        if let Some(dependent) = graph::hard_dependents(&*graph, name).into_iter().next() {
            drop(guard);
            // A dependent registered while the service was stopping; bring it back.
            if was_up
                && self.state(name) == Some(ServiceState::Defined)
                && let Err(e) = self.start(name)
            {
                warn!(service = %name, error = %e, "Refused removal could not restart the service");
            }
            return Err(RegistryError::StillDepended { name: name.clone(), dependent });
        }
        let Some(mut entry) = graph.entries.remove(name) else { return Ok(()) };
        entry.cancel.cancel();
        self.shared.transition(name, &mut entry, ServiceState::Removed);
        graph.capabilities.unpublish_all(name);
        graph.version += 1;
        info!(service = %name, "Service removed");
        Ok(())
    }

    /// Swaps the definition of a registered service.
    ///
    /// A live service is stopped together with its dependents, redefined, and restarted with
    /// them. An idle service is only redefined; a `FAILED` one is reset to `DEFINED`.
    /// Returns start handles for everything that was restarted.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRegistered`], [`RegistryError::CapabilityAlreadyProvided`], or any
    /// error from stopping or restarting.
    pub async fn replace(
        &self,
        definition: ServiceDefinition,
    ) -> Result<Vec<StartHandle>, RegistryError> {
        let name = definition.name().clone();
        let live = {
            let graph = self.shared.graph.lock();
            let entry = graph
                .entries
                .get(&name)
                .ok_or_else(|| RegistryError::NotRegistered { name: name.clone() })?;
            graph.capabilities.check_available(definition.provided_capabilities(), &name)?;
            entry.state.is_active() || entry.state == ServiceState::Stopping
        };

        let stopped = if live { self.stop(&name).await? } else { Vec::new() };

        {
            let mut guard = self.shared.graph.lock();
            let graph = &mut *guard;
            graph.capabilities.check_available(definition.provided_capabilities(), &name)?;
            let entry = graph
                .entries
                .get_mut(&name)
                .ok_or_else(|| RegistryError::NotRegistered { name: name.clone() })?;
            graph.capabilities.unpublish_all(&name);
            for capability in definition.provided_capabilities() {
                graph.capabilities.publish(capability.clone(), name.clone())?;
            }
            entry.definition = definition;
            entry.generation += 1;
            if entry.state == ServiceState::Failed {
                entry.failure = None;
                self.shared.transition(&name, entry, ServiceState::Defined);
            }
            graph.version += 1;
            debug!(service = %name, restarting = stopped.len(), "Service definition replaced");
        }

        stopped.iter().rev().map(|member| self.start(member)).collect()
    }

    /// Stops every service, dependents first, giving each stop at most `timeout`.
    /// Returns how many services were stopped cleanly.
    pub async fn stop_all(&self, timeout: Duration) -> usize {
        let order = {
            let graph = self.shared.graph.lock();
            graph::shutdown_order(&*graph)
                .into_iter()
                .filter(|n| graph.state(n).is_some_and(|s| !s.is_settled() || s == ServiceState::Up))
                .collect::<Vec<_>>()
        };
        let mut stopped = 0;
        for name in order {
            match tokio::time::timeout(timeout, self.stop_one(&name)).await {
                Ok(Ok(())) => stopped += 1,
                Ok(Err(e)) => warn!(service = %name, error = %e, "Service failed to stop"),
                Err(_) => warn!(service = %name, ?timeout, "Timed out stopping service"),
            }
        }
        info!(stopped, "All services stopped");
        stopped
    }

    /// Validation view for a batch of runtime actions; see [`BatchPlan`].
    #[must_use]
    pub fn plan(&self) -> BatchPlan {
        BatchPlan::from_graph(&self.shared.graph.lock())
    }

    /// Applies a verified batch: removals and replacements in order, then starts every
    /// installed service. Start outcomes are reported through the returned handle.
    ///
    /// If the registry changed since the plan was taken, the batch is validated again first.
    ///
    /// # Errors
    ///
    /// [`CommitError`] naming the step whose action the registry refused.
    pub async fn commit(&self, plan: BatchPlan) -> Result<VerificationHandle, CommitError> {
        let actions = {
            let graph = self.shared.graph.lock();
            if graph.version == plan.base_version() {
                plan.into_actions()
            } else {
                debug!("Registry changed since planning, revalidating batch");
                let mut fresh = BatchPlan::from_graph(&graph);
                for (origin, action) in plan.into_actions() {
                    fresh.push(origin, action).map_err(|source| CommitError {
                        origin,
                        source,
                        partially_applied: false,
                    })?;
                }
                fresh.verify().map_err(|(origin, source)| CommitError {
                    origin,
                    source,
                    partially_applied: false,
                })?;
                fresh.into_actions()
            }
        };

        let mut verification = VerificationHandle::default();
        let mut installed = Vec::new();
        let mut applied = false;
        for (origin, action) in actions {
            let result = match action {
                RuntimeAction::Install(definition) => {
                    let name = definition.name().clone();
                    self.register(definition).map(|_| installed.push(name))
                },
                RuntimeAction::Remove(name) => self.remove(&name).await,
                RuntimeAction::Replace(definition) => {
                    self.replace(definition).await.map(|handles| verification.extend(handles))
                },
            };
            result.map_err(|source| CommitError { origin, source, partially_applied: applied })?;
            applied = true;
        }

        for name in installed {
            if self.state(&name).is_none() {
                continue;
            }
            match self.start(&name) {
                Ok(handle) => verification.push(handle),
                Err(e) => verification.reject(name, e),
            }
        }
        Ok(verification)
    }

    #[must_use]
    pub fn state(&self, name: &ServiceName) -> Option<ServiceState> {
        self.shared.graph.lock().state(name)
    }

    /// Runtime value of an `UP` service.
    #[must_use]
    pub fn value<T: Any + Send + Sync>(&self, name: &ServiceName) -> Option<Arc<T>> {
        let value = self.shared.graph.lock().entries.get(name)?.value.clone()?;
        value.downcast::<T>().ok()
    }

    /// Why a `FAILED` service failed.
    #[must_use]
    pub fn failure(&self, name: &ServiceName) -> Option<ActivationError> {
        self.shared.graph.lock().entries.get(name)?.failure.clone()
    }

    #[must_use]
    pub fn resolve_capability(&self, capability: &CapabilityName) -> Option<ServiceName> {
        self.shared.graph.lock().capabilities.resolve(capability).cloned()
    }

    #[must_use]
    pub fn subscribe(&self, name: &ServiceName) -> Option<watch::Receiver<ServiceState>> {
        self.shared.graph.lock().entries.get(name).map(|e| e.status.subscribe())
    }

    /// Every registered service, sorted by name.
    #[must_use]
    pub fn services(&self) -> Vec<ServiceInfo> {
        let graph = self.shared.graph.lock();
        let mut services: Vec<_> = graph
            .entries
            .iter()
            .map(|(name, entry)| ServiceInfo {
                name: name.clone(),
                state: entry.state,
                dependencies: entry.definition.dependencies().to_vec(),
                provides: entry.definition.provided_capabilities().to_vec(),
            })
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        services
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.graph.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bumped on every structural change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.shared.graph.lock().version
    }

    fn ensure_removable(&self, name: &ServiceName) -> Result<(), RegistryError> {
        let graph = self.shared.graph.lock();
        if !graph.entries.contains_key(name) {
            return Err(RegistryError::NotRegistered { name: name.clone() });
        }
        match graph::hard_dependents(&*graph, name).into_iter().next() {
            Some(dependent) => Err(RegistryError::StillDepended { name: name.clone(), dependent }),
            None => Ok(()),
        }
    }

    async fn stop_one(&self, name: &ServiceName) -> Result<(), RegistryError> {
        loop {
            let step = {
                let mut graph = self.shared.graph.lock();
                let Some(entry) = graph.entries.get_mut(name) else { return Ok(()) };
                match entry.state {
                    ServiceState::Defined | ServiceState::Failed | ServiceState::Removed => {
                        StopStep::Done
                    },
                    ServiceState::DependenciesResolving => {
                        entry.cancel.cancel();
                        entry.generation += 1;
                        self.shared.transition(name, entry, ServiceState::Defined);
                        StopStep::Done
                    },
                    ServiceState::Starting | ServiceState::Stopping => {
                        StopStep::Wait(entry.status.subscribe())
                    },
                    ServiceState::Up => {
                        self.shared.transition(name, entry, ServiceState::Stopping);
                        let value = entry.value.take().unwrap_or_else(|| Arc::new(()));
                        StopStep::Stop(entry.definition.service(), value)
                    },
                }
            };

            match step {
                StopStep::Done => return Ok(()),
                StopStep::Wait(mut rx) => {
                    let _ = rx
                        .wait_for(|s| {
                            !matches!(s, ServiceState::Starting | ServiceState::Stopping)
                        })
                        .await;
                },
                StopStep::Stop(service, value) => {
                    let result = service.stop(value).await;
                    let mut graph = self.shared.graph.lock();
                    let Some(entry) = graph.entries.get_mut(name) else { return Ok(()) };
                    return match result {
                        Ok(()) => {
                            self.shared.transition(name, entry, ServiceState::Defined);
                            info!(service = %name, "Service stopped");
                            Ok(())
                        },
                        Err(source) => {
                            entry.failure = Some(source.clone());
                            self.shared.transition(name, entry, ServiceState::Failed);
                            Err(RegistryError::Activation { name: name.clone(), source })
                        },
                    };
                },
            }
        }
    }

    /// Subscribes to every resolvable dependency of an activation that is still current.
    fn watch_dependencies(
        &self,
        name: &ServiceName,
        generation: u64,
    ) -> Option<(Vec<DependencyWatch>, Arc<CancelSignal>)> {
        let mut guard = self.shared.graph.lock();
        let graph = &mut *guard;
        let entry = graph.entries.get(name)?;
        if entry.generation != generation || entry.state != ServiceState::DependenciesResolving {
            return None;
        }

        let mut watches = Vec::new();
        let mut missing = None;
        for dependency in entry.definition.dependencies() {
            match graph.resolve(dependency.target()) {
                Some(target) => {
                    if let Some(dep) = graph.entries.get(&target) {
                        watches.push(DependencyWatch {
                            optional: dependency.is_optional(),
                            rx: dep.status.subscribe(),
                            target,
                        });
                    }
                },
                None if dependency.is_optional() => {},
                None => {
                    missing = Some(ServiceName::new(dependency.target().to_string()));
                    break;
                },
            }
        }
        let cancel = entry.cancel.clone();

        if let Some(dependency) = missing {
            let entry = graph.entries.get_mut(name)?;
            self.fail(name, entry, ActivationError::DependencyUnavailable { dependency });
            return None;
        }
        Some((watches, cancel))
    }

    fn abandon(&self, name: &ServiceName, generation: u64) {
        let mut graph = self.shared.graph.lock();
        if let Some(entry) = graph.entries.get_mut(name)
            && entry.generation == generation
            && entry.state == ServiceState::DependenciesResolving
        {
            debug!(service = %name, "Activation abandoned");
            self.shared.transition(name, entry, ServiceState::Defined);
        }
    }

    fn dependency_failed(&self, name: &ServiceName, generation: u64, dependency: ServiceName) {
        let mut graph = self.shared.graph.lock();
        if let Some(entry) = graph.entries.get_mut(name)
            && entry.generation == generation
            && entry.state == ServiceState::DependenciesResolving
        {
            self.fail(name, entry, ActivationError::DependencyUnavailable { dependency });
        }
    }

    fn fail(&self, name: &ServiceName, entry: &mut Entry, error: ActivationError) {
        warn!(service = %name, error = %error, "Service failed");
        entry.value = None;
        entry.failure = Some(error);
        self.shared.transition(name, entry, ServiceState::Failed);
    }

    /// Moves a ready activation to `STARTING` and collects its injections.
    fn begin_start(
        &self,
        name: &ServiceName,
        generation: u64,
    ) -> Option<(Arc<dyn Service>, StartContext)> {
        let mut guard = self.shared.graph.lock();
        let graph = &mut *guard;
        let entry = graph.entries.get(name)?;
        if entry.generation != generation || entry.state != ServiceState::DependenciesResolving {
            return None;
        }

        let mut injections = FxHashMap::default();
        for dependency in entry.definition.dependencies() {
            let value = graph
                .resolve(dependency.target())
                .and_then(|target| graph.entries.get(&target))
                .filter(|dep| dep.state == ServiceState::Up)
                .and_then(|dep| dep.value.clone());
            if let Some(value) = value {
                injections.insert(dependency.key().to_owned(), value);
            }
        }

        let entry = graph.entries.get_mut(name)?;
        if entry.cancel.is_cancelled() {
            self.shared.transition(name, entry, ServiceState::Defined);
            return None;
        }
        self.shared.transition(name, entry, ServiceState::Starting);
        Some((entry.definition.service(), StartContext::new(name.clone(), injections)))
    }

    fn finish_start(
        &self,
        name: &ServiceName,
        generation: u64,
        result: Result<ServiceValue, ActivationError>,
    ) {
        let mut graph = self.shared.graph.lock();
        let Some(entry) = graph.entries.get_mut(name) else { return };
        if entry.generation != generation || entry.state != ServiceState::Starting {
            return;
        }
        match result {
            Ok(value) => {
                entry.value = Some(value);
                entry.failure = None;
                self.shared.transition(name, entry, ServiceState::Up);
                info!(service = %name, "Service is up");
                if entry.cancel.is_cancelled() {
                    let registry = self.clone();
                    let name = name.clone();
                    tokio::spawn(async move {
                        if let Err(e) = registry.stop(&name).await {
                            warn!(service = %name, error = %e, "Stopping cancelled service failed");
                        }
                    });
                }
            },
            Err(error) => self.fail(name, entry, error),
        }
    }
}

async fn activate(
    registry: ServiceRegistry,
    name: ServiceName,
    generation: u64,
    mut stopping: Vec<ServiceName>,
) {
    loop {
        let Some((watches, cancel)) = registry.watch_dependencies(&name, generation) else {
            return;
        };
        let readiness = tokio::select! {
            biased;
            () = cancel.cancelled() => Readiness::Abandoned,
            readiness = wait_for_dependencies(watches, &stopping) => readiness,
        };
        match readiness {
            Readiness::Ready => break,
            Readiness::Abandoned => return registry.abandon(&name, generation),
            Readiness::Failed(dependency) => {
                return registry.dependency_failed(&name, generation, dependency);
            },
            Readiness::Restart(dependency) => {
                debug!(service = %name, dependency = %dependency, "Restarting stopped dependency");
                stopping.retain(|n| *n != dependency);
                if let Err(e) = registry.start(&dependency) {
                    warn!(service = %name, dependency = %dependency, error = %e, "Dependency cannot restart");
                    return registry.dependency_failed(&name, generation, dependency);
                }
            },
        }
    }

    let Some((service, ctx)) = registry.begin_start(&name, generation) else { return };
    let result = service.start(&ctx).await;
    registry.finish_start(&name, generation, result);
}

async fn wait_for_dependencies(watches: Vec<DependencyWatch>, stopping: &[ServiceName]) -> Readiness {
    for DependencyWatch { target, optional, mut rx } in watches {
        let settled = rx
            .wait_for(|s| {
                matches!(
                    s,
                    ServiceState::Up
                        | ServiceState::Failed
                        | ServiceState::Removed
                        | ServiceState::Defined
                )
            })
            .await
            .map(|s| *s);
        match settled {
            Ok(ServiceState::Up) => {},
            _ if optional => {},
            Ok(ServiceState::Defined) if stopping.contains(&target) => {
                return Readiness::Restart(target);
            },
            Ok(ServiceState::Defined) => return Readiness::Abandoned,
            _ => return Readiness::Failed(target),
        }
    }
    Readiness::Ready
}
