use capstan_domain::events::ServiceTransition;
use capstan_domain::{ServiceName, ServiceState};
use capstan_event_bus::EventBus;
use capstan_services::{
    ActivationError, Dependency, RegistryError, RuntimeAction, Service, ServiceDefinition,
    ServiceRegistry, ServiceValue, StartContext, StartOutcome, async_trait,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn record(&self, entry: String) {
        self.0.lock().push(entry);
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    fn clear(&self) {
        self.0.lock().clear();
    }
}

struct Probe {
    label: String,
    journal: Journal,
    refuse: bool,
    gate: Option<Arc<Notify>>,
    stop_gate: Option<Arc<Notify>>,
}

impl Probe {
    fn new(label: &str, journal: &Journal) -> Self {
        Self { label: label.to_owned(), journal: journal.clone(), refuse: false, gate: None, stop_gate: None }
    }

    fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn slow_to_stop(mut self, gate: Arc<Notify>) -> Self {
        self.stop_gate = Some(gate);
        self
    }
}

#[async_trait]
impl Service for Probe {
    async fn start(&self, ctx: &StartContext) -> Result<ServiceValue, ActivationError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.refuse {
            return Err(ActivationError::start(format!("{} refused to start", self.label)));
        }
        self.journal.record(format!("start {}", self.label));
        let value = match ctx.optional::<String>("upstream") {
            Some(upstream) => format!("{}<-{upstream}", self.label),
            None => self.label.clone(),
        };
        Ok(Arc::new(value))
    }

    async fn stop(&self, _value: ServiceValue) -> Result<(), ActivationError> {
        if let Some(gate) = &self.stop_gate {
            gate.notified().await;
        }
        self.journal.record(format!("stop {}", self.label));
        Ok(())
    }
}

fn upstream(capability: &str) -> Dependency {
    Dependency::capability(capability).inject_as("upstream")
}

/// realm <- domain <- factory, linked through capabilities.
fn security_chain(registry: &ServiceRegistry, journal: &Journal) {
    registry
        .register(ServiceDefinition::new("realm", Probe::new("realm", journal)).provides("cap.realm"))
        .unwrap();
    registry
        .register(
            ServiceDefinition::new("domain", Probe::new("domain", journal))
                .requires(upstream("cap.realm"))
                .provides("cap.domain"),
        )
        .unwrap();
    registry
        .register(
            ServiceDefinition::new("factory", Probe::new("factory", journal))
                .requires(upstream("cap.domain")),
        )
        .unwrap();
}

fn name(s: &str) -> ServiceName {
    ServiceName::new(s)
}

#[tokio::test]
async fn dependencies_start_first_and_values_are_injected() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    security_chain(&registry, &journal);

    let outcome = registry.start(&name("factory")).unwrap().wait().await;

    assert_eq!(outcome, StartOutcome::Up);
    assert_eq!(journal.entries(), ["start realm", "start domain", "start factory"]);
    assert_eq!(
        registry.value::<String>(&name("factory")).unwrap().as_str(),
        "factory<-domain<-realm"
    );
}

#[tokio::test]
async fn missing_capability_leaves_the_service_defined() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    let domain = ServiceDefinition::new("domain", Probe::new("domain", &journal))
        .requires(Dependency::capability("org.wildfly.security.security-realm.Missing"));

    let err = registry.install(domain).unwrap_err();

    assert_eq!(
        err,
        RegistryError::MissingDependency {
            service: name("domain"),
            dependency: "capability org.wildfly.security.security-realm.Missing".into(),
        }
    );
    assert_eq!(registry.state(&name("domain")), Some(ServiceState::Defined));
    assert!(journal.entries().is_empty());
}

#[tokio::test]
async fn second_provider_of_a_capability_is_rejected() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    registry
        .register(ServiceDefinition::new("realm-a", Probe::new("a", &journal)).provides("cap.realm"))
        .unwrap();

    let err = registry
        .register(ServiceDefinition::new("realm-b", Probe::new("b", &journal)).provides("cap.realm"))
        .unwrap_err();

    assert_eq!(
        err,
        RegistryError::CapabilityAlreadyProvided {
            capability: "cap.realm".into(),
            provider: name("realm-a"),
        }
    );
    assert_eq!(registry.resolve_capability(&"cap.realm".into()), Some(name("realm-a")));
    assert_eq!(registry.state(&name("realm-b")), None);
}

#[tokio::test]
async fn cycles_are_refused_before_anything_starts() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    registry
        .register(
            ServiceDefinition::new("a", Probe::new("a", &journal))
                .requires(Dependency::service("b"))
                .provides("cap.a"),
        )
        .unwrap();
    registry
        .register(
            ServiceDefinition::new("b", Probe::new("b", &journal))
                .requires(Dependency::capability("cap.a")),
        )
        .unwrap();

    let err = registry.start(&name("a")).unwrap_err();

    assert!(matches!(err, RegistryError::CyclicDependency { ref cycle } if cycle.len() == 3));
    assert_eq!(registry.state(&name("a")), Some(ServiceState::Defined));
    assert_eq!(registry.state(&name("b")), Some(ServiceState::Defined));
}

#[tokio::test]
async fn three_service_cycle_is_refused_from_every_member() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    for (service, next) in [("a", "cap.b"), ("b", "cap.c"), ("c", "cap.a")] {
        registry
            .register(
                ServiceDefinition::new(service, Probe::new(service, &journal))
                    .requires(Dependency::capability(next))
                    .provides(format!("cap.{service}").as_str()),
            )
            .unwrap();
    }

    for service in ["a", "b", "c"] {
        let err = registry.start(&name(service)).unwrap_err();
        assert!(matches!(err, RegistryError::CyclicDependency { .. }), "{service}: {err}");
    }

    for service in ["a", "b", "c"] {
        assert_eq!(registry.state(&name(service)), Some(ServiceState::Defined));
    }
    assert!(journal.entries().is_empty());
}

#[tokio::test]
async fn start_brings_back_a_dependency_that_was_stopping() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    let gate = Arc::new(Notify::new());
    registry
        .register(
            ServiceDefinition::new("dep", Probe::new("dep", &journal).slow_to_stop(gate.clone()))
                .provides("cap.dep"),
        )
        .unwrap();
    assert!(registry.start(&name("dep")).unwrap().wait().await.is_up());
    registry
        .register(ServiceDefinition::new("top", Probe::new("top", &journal)).requires(upstream("cap.dep")))
        .unwrap();

    let stopping = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.stop(&name("dep")).await })
    };
    let mut dep = registry.subscribe(&name("dep")).unwrap();
    dep.wait_for(|s| *s == ServiceState::Stopping).await.unwrap();

    let handle = registry.start(&name("top")).unwrap();
    gate.notify_one();

    assert_eq!(stopping.await.unwrap().unwrap(), [name("dep")]);
    assert_eq!(handle.wait().await, StartOutcome::Up);
    assert_eq!(registry.state(&name("dep")), Some(ServiceState::Up));
    assert_eq!(registry.value::<String>(&name("top")).unwrap().as_str(), "top<-dep");
    assert_eq!(journal.entries(), ["start dep", "stop dep", "start dep", "start top"]);
}

#[tokio::test]
async fn failure_propagates_to_waiting_dependents() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    registry
        .register(
            ServiceDefinition::new("realm", Probe::new("realm", &journal).refusing())
                .provides("cap.realm"),
        )
        .unwrap();
    registry
        .register(
            ServiceDefinition::new("domain", Probe::new("domain", &journal))
                .requires(upstream("cap.realm")),
        )
        .unwrap();

    let outcome = registry.start(&name("domain")).unwrap().wait().await;

    assert_eq!(
        outcome,
        StartOutcome::Failed(ActivationError::DependencyUnavailable { dependency: name("realm") })
    );
    assert_eq!(registry.state(&name("realm")), Some(ServiceState::Failed));
    assert!(matches!(registry.failure(&name("realm")), Some(ActivationError::Start { .. })));

    registry
        .register(
            ServiceDefinition::new("late", Probe::new("late", &journal))
                .requires(Dependency::service("realm")),
        )
        .unwrap();
    assert_eq!(
        registry.start(&name("late")).unwrap_err(),
        RegistryError::DependencyFailed { service: name("late"), dependency: name("realm") }
    );
    assert_eq!(
        registry.start(&name("domain")).unwrap_err(),
        RegistryError::ServiceFailed { name: name("domain") }
    );
}

#[tokio::test]
async fn optional_dependency_that_nobody_provides_is_skipped() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    let connector = ServiceDefinition::new("connector", Probe::new("connector", &journal))
        .requires(upstream("org.wildfly.undertow.listener.default").optional());

    let outcome = registry.install(connector).unwrap().wait().await;

    assert!(outcome.is_up());
    assert_eq!(registry.value::<String>(&name("connector")).unwrap().as_str(), "connector");
}

#[tokio::test]
async fn stop_takes_dependents_down_first() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    security_chain(&registry, &journal);
    assert!(registry.start(&name("factory")).unwrap().wait().await.is_up());
    journal.clear();

    let stopped = registry.stop(&name("realm")).await.unwrap();

    assert_eq!(stopped, [name("factory"), name("domain"), name("realm")]);
    assert_eq!(journal.entries(), ["stop factory", "stop domain", "stop realm"]);
    for service in ["realm", "domain", "factory"] {
        assert_eq!(registry.state(&name(service)), Some(ServiceState::Defined));
    }
}

#[tokio::test]
async fn remove_is_refused_while_something_requires_the_service() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    security_chain(&registry, &journal);
    assert!(registry.start(&name("factory")).unwrap().wait().await.is_up());

    let err = registry.remove(&name("realm")).await.unwrap_err();
    assert_eq!(err, RegistryError::StillDepended { name: name("realm"), dependent: name("domain") });
    assert_eq!(registry.state(&name("realm")), Some(ServiceState::Up));

    registry.remove(&name("factory")).await.unwrap();
    registry.remove(&name("domain")).await.unwrap();
    registry.remove(&name("realm")).await.unwrap();

    assert!(registry.is_empty());
    assert!(registry.resolve_capability(&"cap.realm".into()).is_none());
    assert_eq!(journal.entries().last().map(String::as_str), Some("stop realm"));
}

#[tokio::test]
async fn removal_refused_mid_stop_restarts_the_service() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    let gate = Arc::new(Notify::new());
    registry
        .register(ServiceDefinition::new("realm", Probe::new("realm", &journal).slow_to_stop(gate.clone())))
        .unwrap();
    assert!(registry.start(&name("realm")).unwrap().wait().await.is_up());

    let removing = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.remove(&name("realm")).await })
    };
    let mut realm = registry.subscribe(&name("realm")).unwrap();
    realm.wait_for(|s| *s == ServiceState::Stopping).await.unwrap();
    registry
        .register(ServiceDefinition::new("late", Probe::new("late", &journal)).requires(Dependency::service("realm")))
        .unwrap();
    gate.notify_one();

    let err = removing.await.unwrap().unwrap_err();
    assert_eq!(err, RegistryError::StillDepended { name: name("realm"), dependent: name("late") });
    realm.wait_for(|s| *s == ServiceState::Up).await.unwrap();
    assert_eq!(journal.entries(), ["start realm", "stop realm", "start realm"]);
}

#[tokio::test]
async fn cancelling_while_dependencies_resolve_returns_to_defined() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    let gate = Arc::new(Notify::new());
    registry
        .register(
            ServiceDefinition::new("slow", Probe::new("slow", &journal).gated(gate.clone()))
                .provides("cap.slow"),
        )
        .unwrap();
    registry
        .register(
            ServiceDefinition::new("waiting", Probe::new("waiting", &journal))
                .requires(upstream("cap.slow")),
        )
        .unwrap();

    let handle = registry.start(&name("waiting")).unwrap();
    handle.cancel();

    assert_eq!(handle.wait().await, StartOutcome::Cancelled);
    assert_eq!(registry.state(&name("waiting")), Some(ServiceState::Defined));

    let mut slow = registry.subscribe(&name("slow")).unwrap();
    gate.notify_one();
    slow.wait_for(|s| *s == ServiceState::Up).await.unwrap();
    assert_eq!(journal.entries(), ["start slow"]);
}

#[tokio::test]
async fn replace_restarts_a_live_service_with_its_dependents() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    security_chain(&registry, &journal);
    assert!(registry.start(&name("domain")).unwrap().wait().await.is_up());
    journal.clear();

    let replacement =
        ServiceDefinition::new("realm", Probe::new("realm-v2", &journal)).provides("cap.realm");
    let handles = registry.replace(replacement).await.unwrap();
    for handle in handles {
        assert!(handle.wait().await.is_up());
    }

    assert_eq!(
        journal.entries(),
        ["stop domain", "stop realm", "start realm-v2", "start domain"]
    );
    assert_eq!(registry.value::<String>(&name("domain")).unwrap().as_str(), "domain<-realm-v2");
    assert_eq!(registry.state(&name("factory")), Some(ServiceState::Defined));
}

#[tokio::test]
async fn replace_resets_a_failed_service() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    let broken = ServiceDefinition::new("realm", Probe::new("realm", &journal).refusing());
    assert!(matches!(registry.install(broken).unwrap().wait().await, StartOutcome::Failed(_)));

    let handles = registry
        .replace(ServiceDefinition::new("realm", Probe::new("realm", &journal)))
        .await
        .unwrap();

    assert!(handles.is_empty());
    assert_eq!(registry.state(&name("realm")), Some(ServiceState::Defined));
    assert!(registry.failure(&name("realm")).is_none());
    assert!(registry.start(&name("realm")).unwrap().wait().await.is_up());
}

#[tokio::test]
async fn committed_batch_starts_everything_it_installs() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    let mut plan = registry.plan();
    plan.push(
        1,
        RuntimeAction::Install(
            ServiceDefinition::new("domain", Probe::new("domain", &journal))
                .requires(upstream("cap.realm")),
        ),
    )
    .unwrap();
    plan.push(
        2,
        RuntimeAction::Install(
            ServiceDefinition::new("realm", Probe::new("realm", &journal)).provides("cap.realm"),
        ),
    )
    .unwrap();
    plan.verify().unwrap();

    let report = registry.commit(plan).await.unwrap().wait(Some(Duration::from_secs(5))).await;

    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.up.len(), 2);
    assert_eq!(journal.entries(), ["start realm", "start domain"]);
}

#[tokio::test]
async fn stale_plans_are_revalidated_on_commit() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    let mut plan = registry.plan();
    plan.push(
        1,
        RuntimeAction::Install(
            ServiceDefinition::new("realm", Probe::new("realm", &journal)).provides("cap.realm"),
        ),
    )
    .unwrap();

    registry
        .register(ServiceDefinition::new("other", Probe::new("other", &journal)).provides("cap.realm"))
        .unwrap();
    let err = registry.commit(plan).await.unwrap_err();

    assert_eq!(err.origin, 1);
    assert!(!err.partially_applied);
    assert!(matches!(err.source, RegistryError::CapabilityAlreadyProvided { .. }));
    assert_eq!(registry.state(&name("realm")), None);
}

#[tokio::test]
async fn transitions_are_published_on_the_event_bus() {
    let bus = EventBus::new();
    let mut events = bus.subscribe::<ServiceTransition>();
    let registry = ServiceRegistry::with_events(bus);
    let journal = Journal::default();

    let handle = registry.install(ServiceDefinition::new("realm", Probe::new("realm", &journal))).unwrap();
    assert!(handle.wait().await.is_up());

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push((event.from, event.to));
    }
    assert_eq!(
        seen,
        [
            (ServiceState::Defined, ServiceState::DependenciesResolving),
            (ServiceState::DependenciesResolving, ServiceState::Starting),
            (ServiceState::Starting, ServiceState::Up),
        ]
    );
}

#[tokio::test]
async fn stop_all_brings_every_service_down() {
    let registry = ServiceRegistry::new();
    let journal = Journal::default();
    security_chain(&registry, &journal);
    assert!(registry.start(&name("factory")).unwrap().wait().await.is_up());
    journal.clear();

    let stopped = registry.stop_all(Duration::from_secs(1)).await;

    assert_eq!(stopped, 3);
    assert_eq!(journal.entries(), ["stop factory", "stop domain", "stop realm"]);
}
