use capstan_controller::{
    ControllerError, ErrorKind, Extension, ModelController, ResourceDefinitionRegistry,
    RuntimeEffect,
};
use capstan_domain::capabilities::{EE_MANAGED_EXECUTOR, dynamic};
use capstan_domain::{CompositeRequest, ModelValue, Operation, ProcessState, ServiceName, ServiceState};
use capstan_ee::{
    EeExtension, ManagedExecutor, RejectPolicy, context_service_address, default_operations,
    managed_executor_address,
};
use capstan_event_bus::EventBus;
use capstan_services::ServiceRegistry;
use std::time::Duration;

fn controller() -> ModelController {
    let mut definitions = ResourceDefinitionRegistry::new();
    EeExtension.register(&mut definitions);
    let events = EventBus::new();
    ModelController::new(definitions, ServiceRegistry::with_events(events.clone()), events)
}

fn executor_service(name: &str) -> ServiceName {
    dynamic(EE_MANAGED_EXECUTOR, name).as_str().into()
}

async fn booted() -> ModelController {
    let controller = controller();
    let mut outcome = controller.execute_boot(default_operations().into_iter().collect()).await.unwrap();
    let report = outcome.verify(Some(Duration::from_secs(5))).await;
    assert!(report.is_success(), "{report:?}");
    controller.set_process_state(ProcessState::Running);
    controller
}

#[tokio::test]
async fn default_executor_is_wired_to_the_default_context() {
    let controller = booted().await;

    let executor = controller.registry().value::<ManagedExecutor>(&executor_service("default")).unwrap();
    assert_eq!(executor.jndi_name(), "java:jboss/ee/concurrency/executor/default");
    assert_eq!(executor.context().unwrap().jndi_name, "java:jboss/ee/concurrency/context/default");
    assert_eq!(executor.settings().max_threads, 25);
    assert_eq!(executor.settings().reject_policy, RejectPolicy::Abort);

    let handle = executor.submit(async { 21 * 2 }).await.unwrap();
    assert_eq!(handle.await.unwrap(), Some(42));
}

#[tokio::test]
async fn executor_changes_after_boot_wait_for_reload() {
    let controller = booted().await;

    let outcome = controller
        .execute(Operation::write_attribute(managed_executor_address("default"), "max-threads", 4).into())
        .await
        .unwrap();

    assert!(outcome.reload_required);
    assert_eq!(controller.process_state(), ProcessState::ReloadRequired);
    let executor = controller.registry().value::<ManagedExecutor>(&executor_service("default")).unwrap();
    assert_eq!(executor.settings().max_threads, 25);

    let outcome = controller
        .execute(
            Operation::add(managed_executor_address("batch"), [("jndi-name", "java:jboss/ee/concurrency/executor/batch")])
                .into(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.steps[0].runtime, [RuntimeEffect::ReloadRequired]);
    assert_eq!(controller.registry().state(&executor_service("batch")), None);
}

#[tokio::test]
async fn context_services_can_be_added_at_runtime() {
    let controller = booted().await;

    let mut outcome = controller
        .execute(Operation::add(context_service_address("batch"), [("jndi-name", "java:jboss/ee/concurrency/context/batch")]).into())
        .await
        .unwrap();

    assert!(outcome.verify(Some(Duration::from_secs(5))).await.is_success());
    let name: ServiceName = "org.wildfly.ee.concurrent.context.service.batch".into();
    assert_eq!(controller.registry().state(&name), Some(ServiceState::Up));
}

#[tokio::test]
async fn inconsistent_sizing_is_rejected() {
    let controller = controller();
    let mut operations = default_operations();
    operations.push(Operation::add(
        managed_executor_address("tiny"),
        [
            ("jndi-name", ModelValue::from("java:jboss/ee/concurrency/executor/tiny")),
            ("core-threads", ModelValue::Int(8)),
            ("max-threads", ModelValue::Int(2)),
        ],
    ));

    let err = controller.execute_boot(operations.into_iter().collect::<CompositeRequest>()).await.unwrap_err();

    assert!(matches!(err, ControllerError::StepFailed { step: 4, .. }), "{err}");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(controller.snapshot().len(), 0);
    assert!(controller.registry().is_empty());
}

#[tokio::test]
async fn unknown_reject_policy_is_rejected() {
    let controller = booted().await;

    let err = controller
        .execute(Operation::write_attribute(managed_executor_address("default"), "reject-policy", "DISCARD").into())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
}
