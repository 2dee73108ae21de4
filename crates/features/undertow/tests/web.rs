use capstan_controller::{ErrorKind, Extension, ModelController, ResourceDefinitionRegistry};
use capstan_domain::capabilities::{UNDERTOW_APPLICATION_SECURITY_DOMAIN, UNDERTOW_LISTENER, dynamic};
use capstan_domain::{CompositeRequest, ModelValue, Operation, OperationHeaders, ServiceName};
use capstan_elytron::ElytronExtension;
use capstan_event_bus::EventBus;
use capstan_services::ServiceRegistry;
use capstan_undertow::{
    DEFAULT_HTTP_LISTENER, DEFAULT_SERVER, HttpListener, UndertowExtension, WebSecurityDomain,
    add_application_security_domain, default_operations, http_listener_address,
};
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Option<Duration> = Some(Duration::from_secs(5));

fn controller() -> ModelController {
    let mut definitions = ResourceDefinitionRegistry::new();
    ElytronExtension.register(&mut definitions);
    UndertowExtension.register(&mut definitions);
    let events = EventBus::new();
    ModelController::new(definitions, ServiceRegistry::with_events(events.clone()), events)
}

fn listener_service() -> ServiceName {
    dynamic(UNDERTOW_LISTENER, DEFAULT_HTTP_LISTENER).as_str().into()
}

async fn booted(controller: &ModelController) {
    let mut outcome = controller.execute_boot(default_operations().into_iter().collect()).await.unwrap();
    let report = outcome.verify(TIMEOUT).await;
    assert!(report.is_success(), "{report:?}");
}

#[tokio::test]
async fn default_listener_is_published() {
    let controller = controller();
    booted(&controller).await;

    let listener = controller.registry().value::<HttpListener>(&listener_service()).unwrap();
    assert_eq!(listener.server, DEFAULT_SERVER);
    assert_eq!(listener.port, 8080);
    assert!(listener.enabled);
    assert!(controller.registry().resolve_capability(&dynamic(UNDERTOW_LISTENER, DEFAULT_HTTP_LISTENER)).is_some());
}

#[tokio::test]
async fn listener_port_changes_restart_the_listener() {
    let controller = controller();
    booted(&controller).await;
    let write = Operation::write_attribute(http_listener_address(DEFAULT_SERVER, DEFAULT_HTTP_LISTENER), "port", 8180);

    let err = controller.execute(write.clone().into()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(controller.registry().value::<HttpListener>(&listener_service()).unwrap().port, 8080);

    let mut outcome = controller
        .execute(CompositeRequest::from(write).headers(OperationHeaders::ALLOW_RESOURCE_SERVICE_RESTART))
        .await
        .unwrap();
    assert!(outcome.verify(TIMEOUT).await.is_success());
    assert_eq!(controller.registry().value::<HttpListener>(&listener_service()).unwrap().port, 8180);
}

#[tokio::test]
async fn out_of_range_ports_are_rejected() {
    let controller = controller();
    booted(&controller).await;

    let err = controller
        .execute(
            Operation::write_attribute(http_listener_address(DEFAULT_SERVER, DEFAULT_HTTP_LISTENER), "port", 70_000)
                .into(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        controller.read_attribute(&http_listener_address(DEFAULT_SERVER, DEFAULT_HTTP_LISTENER), "port").unwrap(),
        ModelValue::Int(8080)
    );
}

#[tokio::test]
async fn application_security_domain_binds_an_http_factory() {
    let dir = TempDir::new().unwrap();
    let users = dir.path().join("users.properties");
    std::fs::write(&users, "alice=secret\n").unwrap();
    let users = users.display().to_string();
    let controller = controller();
    booted(&controller).await;

    let request: CompositeRequest = capstan_elytron::default_operations()
        .into_iter()
        .chain([
            capstan_elytron::add_properties_realm("ApplicationRealm", &users, None, true),
            capstan_elytron::add_security_domain("ApplicationDomain", "ApplicationRealm", &["ApplicationRealm"], None),
            capstan_elytron::add_http_authentication_factory(
                "application-http",
                "ApplicationDomain",
                &["BASIC", "FORM"],
                "ApplicationRealm",
            ),
            add_application_security_domain("other", "application-http"),
        ])
        .collect();
    let mut outcome = controller.execute(request).await.unwrap();
    let report = outcome.verify(TIMEOUT).await;
    assert!(report.is_success(), "{report:?}");

    let name: ServiceName = dynamic(UNDERTOW_APPLICATION_SECURITY_DOMAIN, "other").as_str().into();
    let domain = controller.registry().value::<WebSecurityDomain>(&name).unwrap();
    assert!(!domain.override_deployment_config);
    assert_eq!(domain.factory.mechanism_names().collect::<Vec<_>>(), ["BASIC", "FORM"]);
    assert_eq!(domain.factory.security_domain().identity("alice").unwrap().realm, "ApplicationRealm");
}

#[tokio::test]
async fn application_security_domain_needs_a_factory() {
    let controller = controller();
    booted(&controller).await;
    let before = controller.snapshot();

    let err = controller.execute(add_application_security_domain("other", "missing").into()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Dependency);
    assert!(controller.snapshot().same_content(&before));
}
