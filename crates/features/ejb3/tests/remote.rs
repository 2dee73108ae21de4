use capstan_controller::{ControllerError, ErrorKind, Extension, ModelController, OperationError, ResourceDefinitionRegistry};
use capstan_domain::capabilities::{EJB_APPLICATION_SECURITY_DOMAIN, EJB_REMOTE, dynamic};
use capstan_domain::{CompositeRequest, ModelValue, OperationHeaders, ServiceName};
use capstan_ejb3::{
    DEFAULT_CONNECTOR, EjbSecurityDomain, Ejb3Extension, RemoteService, RemotingExtension, add_application_security_domain,
    add_http_connector, remote_service_address, write_connector_ref,
};
use capstan_elytron::ElytronExtension;
use capstan_event_bus::EventBus;
use capstan_services::ServiceRegistry;
use capstan_undertow::UndertowExtension;
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Option<Duration> = Some(Duration::from_secs(5));

fn controller() -> ModelController {
    let mut definitions = ResourceDefinitionRegistry::new();
    for extension in [
        &ElytronExtension as &dyn Extension,
        &UndertowExtension,
        &RemotingExtension,
        &Ejb3Extension,
    ] {
        extension.register(&mut definitions);
    }
    let events = EventBus::new();
    ModelController::new(definitions, ServiceRegistry::with_events(events.clone()), events)
}

fn remote() -> ServiceName {
    EJB_REMOTE.into()
}

async fn booted(dir: &TempDir) -> ModelController {
    let users = dir.path().join("users.properties");
    let groups = dir.path().join("roles.properties");
    std::fs::write(&users, "user1=password1\n").unwrap();
    std::fs::write(&groups, "user1=Users,Role1\n").unwrap();

    let boot: CompositeRequest = capstan_elytron::default_operations()
        .into_iter()
        .chain(capstan_undertow::default_operations())
        .chain(capstan_ejb3::default_operations())
        .chain([
            capstan_elytron::add_properties_realm(
                "ejb3-tests-ejb3-UsersRoles",
                &users.display().to_string(),
                Some(&groups.display().to_string()),
                true,
            ),
            capstan_elytron::add_security_domain(
                "ejb3-tests",
                "ejb3-tests-ejb3-UsersRoles",
                &["ejb3-tests-ejb3-UsersRoles"],
                Some(capstan_elytron::GROUPS_TO_ROLES),
            ),
            capstan_elytron::add_sasl_authentication_factory("ejb3-tests", "ejb3-tests", &["BASIC"]),
        ])
        .collect();

    let controller = controller();
    let mut outcome = controller.execute_boot(boot).await.unwrap();
    let report = outcome.verify(TIMEOUT).await;
    assert!(report.is_success(), "{report:?}");
    controller
}

#[tokio::test]
async fn remote_service_starts_on_the_default_connector() {
    let dir = TempDir::new().unwrap();
    let controller = booted(&dir).await;

    let service = controller.registry().value::<RemoteService>(&remote()).unwrap();
    assert_eq!(service.connector.name(), DEFAULT_CONNECTOR);
    assert_eq!(service.connector.uri(), "http-remoting://127.0.0.1:8080");
    assert!(service.connector.sasl_authentication_factory().is_none());
    assert_eq!(service.cluster, "ejb");
}

#[tokio::test]
async fn connector_rewrite_needs_restart_permission() {
    let dir = TempDir::new().unwrap();
    let controller = booted(&dir).await;
    let mut outcome = controller
        .execute(add_http_connector("ejb3-tests", capstan_undertow::DEFAULT_HTTP_LISTENER, Some("ejb3-tests")).into())
        .await
        .unwrap();
    assert!(outcome.verify(TIMEOUT).await.is_success());

    let err = controller.execute(write_connector_ref("ejb3-tests").into()).await.unwrap_err();
    assert!(
        matches!(&err, ControllerError::StepFailed { source: OperationError::RestartRefused { service, .. }, .. } if *service == remote()),
        "{err}"
    );
    assert_eq!(
        controller.read_attribute(&remote_service_address(), "connector-ref").unwrap(),
        ModelValue::from(DEFAULT_CONNECTOR)
    );

    let mut outcome = controller
        .execute(
            CompositeRequest::from(write_connector_ref("ejb3-tests"))
                .headers(OperationHeaders::ALLOW_RESOURCE_SERVICE_RESTART),
        )
        .await
        .unwrap();
    assert!(outcome.verify(TIMEOUT).await.is_success());

    let service = controller.registry().value::<RemoteService>(&remote()).unwrap();
    assert_eq!(service.connector.name(), "ejb3-tests");
    let sasl = service.connector.sasl_authentication_factory().unwrap();
    assert_eq!(sasl.mechanism_names().collect::<Vec<_>>(), ["BASIC"]);
}

#[tokio::test]
async fn application_security_domain_resolves_roles() {
    let dir = TempDir::new().unwrap();
    let controller = booted(&dir).await;

    let mut outcome = controller.execute(add_application_security_domain("ejb3-tests", "ejb3-tests").into()).await.unwrap();
    assert!(outcome.verify(TIMEOUT).await.is_success());

    let name: ServiceName = dynamic(EJB_APPLICATION_SECURITY_DOMAIN, "ejb3-tests").as_str().into();
    let domain = controller.registry().value::<EjbSecurityDomain>(&name).unwrap();
    assert!(!domain.enable_jacc);
    assert_eq!(domain.domain.identity("user1").unwrap().roles, ["Users", "Role1"]);
}

#[tokio::test]
async fn jacc_changes_wait_for_reload() {
    let dir = TempDir::new().unwrap();
    let controller = booted(&dir).await;
    controller.execute(add_application_security_domain("ejb3-tests", "ejb3-tests").into()).await.unwrap();

    let outcome = controller
        .execute(
            capstan_domain::Operation::write_attribute(
                capstan_ejb3::application_security_domain_address("ejb3-tests"),
                "enable-jacc",
                true,
            )
            .into(),
        )
        .await
        .unwrap();

    assert!(outcome.reload_required);
}

#[tokio::test]
async fn connectors_need_a_listener() {
    let dir = TempDir::new().unwrap();
    let controller = booted(&dir).await;
    let before = controller.snapshot();

    let err = controller.execute(add_http_connector("orphan", "missing-listener", None).into()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Dependency);
    assert!(controller.snapshot().same_content(&before));
}
