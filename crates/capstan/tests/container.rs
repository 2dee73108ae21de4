use capstan::domain::capabilities::{
    EJB_APPLICATION_SECURITY_DOMAIN, EJB_REMOTE, HTTP_AUTHENTICATION_FACTORY, REMOTING_CONNECTOR,
    SASL_AUTHENTICATION_FACTORY, SECURITY_DOMAIN, SECURITY_REALM, UNDERTOW_APPLICATION_SECURITY_DOMAIN, dynamic,
};
use capstan::domain::{ProcessState, ServiceName, ServiceState};
use capstan::features::{ee, ejb3, elytron, undertow};
use capstan::{
    CompositeRequest, Container, ContainerError, ControllerError, ErrorKind, ModelValue, Operation, OperationError,
    OperationHeaders, default_profile, load_boot_file,
};
use std::path::PathBuf;
use tempfile::TempDir;

const DOMAIN: &str = "ejb3-tests";
const REALM: &str = "ejb3-tests-ejb3-UsersRoles";

struct Files {
    _dir: TempDir,
    users: String,
    groups: String,
}

fn files() -> Files {
    let dir = TempDir::new().unwrap();
    let users = dir.path().join("users.properties");
    let groups = dir.path().join("roles.properties");
    std::fs::write(&users, "user1=password1\nuser2=password2\n").unwrap();
    std::fs::write(&groups, "user1=Users,Role1\nuser2=Users,Role2\n").unwrap();
    Files { users: users.display().to_string(), groups: groups.display().to_string(), _dir: dir }
}

async fn booted() -> Container {
    let container = Container::builder().default_extensions().build().unwrap();
    let report = container.boot([default_profile()]).await.unwrap();
    assert!(report.is_success());
    assert_eq!(container.process_state(), ProcessState::Running);
    container
}

fn service(capability: &str, name: &str) -> ServiceName {
    dynamic(capability, name).as_str().into()
}

fn remote() -> ServiceName {
    EJB_REMOTE.into()
}

fn setup_steps(files: &Files) -> CompositeRequest {
    CompositeRequest::new().with_id("ejb-elytron-setup").steps([
        elytron::add_properties_realm(REALM, &files.users, Some(&files.groups), true),
        elytron::add_security_domain(DOMAIN, REALM, &[REALM], Some(elytron::GROUPS_TO_ROLES)),
        elytron::add_sasl_authentication_factory(DOMAIN, DOMAIN, &["BASIC"]),
        ejb3::add_http_connector(DOMAIN, undertow::DEFAULT_HTTP_LISTENER, Some(DOMAIN)),
        ejb3::add_application_security_domain(DOMAIN, DOMAIN),
        ejb3::write_connector_ref(DOMAIN),
        elytron::add_http_authentication_factory(DOMAIN, DOMAIN, &["BASIC"], "TestingRealm"),
        undertow::add_application_security_domain(DOMAIN, DOMAIN),
    ])
}

fn teardown_steps() -> CompositeRequest {
    CompositeRequest::new()
        .steps([
            Operation::remove(undertow::application_security_domain_address(DOMAIN)),
            Operation::remove(elytron::http_authentication_factory_address(DOMAIN)),
            ejb3::write_connector_ref(ejb3::DEFAULT_CONNECTOR),
            Operation::remove(ejb3::application_security_domain_address(DOMAIN)),
            Operation::remove(ejb3::http_connector_address(DOMAIN)),
            Operation::remove(elytron::sasl_authentication_factory_address(DOMAIN)),
            Operation::remove(elytron::security_domain_address(DOMAIN)),
            Operation::remove(elytron::properties_realm_address(REALM)),
        ])
        .headers(OperationHeaders::ALLOW_RESOURCE_SERVICE_RESTART)
}

fn provisioned_services() -> [ServiceName; 7] {
    [
        service(SECURITY_REALM, REALM),
        service(SECURITY_DOMAIN, DOMAIN),
        service(SASL_AUTHENTICATION_FACTORY, DOMAIN),
        service(REMOTING_CONNECTOR, DOMAIN),
        service(EJB_APPLICATION_SECURITY_DOMAIN, DOMAIN),
        service(HTTP_AUTHENTICATION_FACTORY, DOMAIN),
        service(UNDERTOW_APPLICATION_SECURITY_DOMAIN, DOMAIN),
    ]
}

#[tokio::test]
async fn default_profile_boots_every_subsystem() {
    let container = booted().await;

    let executor = container
        .registry()
        .value::<ee::ManagedExecutor>(&service(capstan::domain::capabilities::EE_MANAGED_EXECUTOR, "default"))
        .unwrap();
    assert_eq!(executor.context().unwrap().name, "default");
    let ejb_remote = container.registry().value::<ejb3::RemoteService>(&remote()).unwrap();
    assert_eq!(ejb_remote.connector.name(), ejb3::DEFAULT_CONNECTOR);
    assert!(container.registry().services().iter().all(|s| s.state == ServiceState::Up));
    assert!(capstan::features::is_enabled("remoting"));
}

#[tokio::test]
async fn security_domain_setup_and_teardown() {
    let files = files();
    let container = booted().await;
    let before = container.snapshot();

    let mut outcome = container
        .execute(setup_steps(&files).headers(OperationHeaders::ALLOW_RESOURCE_SERVICE_RESTART))
        .await
        .unwrap();
    let report = outcome.verify(Some(std::time::Duration::from_secs(10))).await;
    assert!(report.is_success(), "{report:?}");
    assert_eq!(outcome.request_id, "ejb-elytron-setup");

    for name in provisioned_services() {
        assert_eq!(container.registry().state(&name), Some(ServiceState::Up), "{name}");
    }
    let ejb_remote = container.registry().value::<ejb3::RemoteService>(&remote()).unwrap();
    assert_eq!(ejb_remote.connector.name(), DOMAIN);
    let sasl = ejb_remote.connector.sasl_authentication_factory().unwrap();
    assert_eq!(sasl.security_domain().identity("user1").unwrap().roles, ["Users", "Role1"]);

    let mut outcome = container.execute(teardown_steps()).await.unwrap();
    assert!(outcome.verify(Some(std::time::Duration::from_secs(10))).await.is_success());

    for name in provisioned_services() {
        assert_eq!(container.registry().state(&name), None, "{name}");
    }
    assert_eq!(container.registry().state(&remote()), Some(ServiceState::Up));
    let ejb_remote = container.registry().value::<ejb3::RemoteService>(&remote()).unwrap();
    assert_eq!(ejb_remote.connector.name(), ejb3::DEFAULT_CONNECTOR);
    assert!(container.snapshot().same_content(&before));
}

#[tokio::test]
async fn setup_without_restart_permission_changes_nothing() {
    let files = files();
    let container = booted().await;
    let before = container.snapshot();
    let services = container.registry().len();

    let err = container.execute(setup_steps(&files)).await.unwrap_err();

    let err = match err {
        ContainerError::Controller(err) => err,
        other => panic!("unexpected error: {other}"),
    };
    assert!(matches!(
        &err,
        ControllerError::StepFailed { step: 6, source: OperationError::RestartRefused { service, .. }, .. }
            if *service == remote()
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(container.snapshot().same_content(&before));
    assert_eq!(container.registry().len(), services);
    assert_eq!(
        container.controller().read_attribute(&ejb3::remote_service_address(), "connector-ref").unwrap(),
        ModelValue::from(ejb3::DEFAULT_CONNECTOR)
    );
}

#[tokio::test]
async fn boot_file_requests_follow_the_default_profile() {
    let files = files();
    let dir = TempDir::new().unwrap();
    let path: PathBuf = dir.path().join("boot.json");
    let requests = vec![CompositeRequest::new().steps([
        elytron::add_properties_realm(REALM, &files.users, Some(&files.groups), true),
        elytron::add_security_domain(DOMAIN, REALM, &[REALM], Some(elytron::GROUPS_TO_ROLES)),
    ])];
    std::fs::write(&path, serde_json::to_string_pretty(&requests).unwrap()).unwrap();

    let loaded = load_boot_file(&path).await.unwrap();
    assert_eq!(loaded, requests);

    let container = Container::builder().default_extensions().build().unwrap();
    container.boot(std::iter::once(default_profile()).chain(loaded)).await.unwrap();
    assert_eq!(container.registry().state(&service(SECURITY_DOMAIN, DOMAIN)), Some(ServiceState::Up));
}

#[tokio::test]
async fn malformed_boot_files_are_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("boot.json");
    std::fs::write(&path, r#"{"steps": []}"#).unwrap();

    assert!(matches!(load_boot_file(&path).await, Err(ContainerError::BootFileFormat { .. })));
    assert!(matches!(
        load_boot_file(dir.path().join("absent.json")).await,
        Err(ContainerError::BootFileIo { .. })
    ));
}

#[tokio::test]
async fn failed_boot_services_keep_the_container_starting() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.properties").display().to_string();
    let container = Container::builder().default_extensions().build().unwrap();

    let err = container
        .boot([default_profile(), elytron::add_properties_realm("broken", &missing, None, false).into()])
        .await
        .unwrap_err();

    let report = match err {
        ContainerError::BootVerification { report } => report,
        other => panic!("unexpected error: {other}"),
    };
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, service(SECURITY_REALM, "broken"));
    assert_eq!(container.process_state(), ProcessState::Starting);
}

#[tokio::test]
async fn boot_runs_once() {
    let container = booted().await;

    let err = container.boot([default_profile()]).await.unwrap_err();

    assert!(matches!(err, ContainerError::InvalidState { state: ProcessState::Running, .. }), "{err}");
}

#[tokio::test]
async fn failing_boot_request_names_its_position() {
    let container = Container::builder().default_extensions().build().unwrap();

    let err = container.boot([default_profile(), default_profile()]).await.unwrap_err();

    assert!(matches!(err, ContainerError::BootRequest { request: 2, .. }), "{err}");
    assert_eq!(err.request_kind(), Some(ErrorKind::ModelStructure));
}

#[test]
fn subsystems_are_claimed_once() {
    let err = Container::builder().extension(ee::EeExtension).extension(ee::EeExtension).build().unwrap_err();

    assert!(matches!(err, ContainerError::DuplicateSubsystem { subsystem: "ee", .. }), "{err}");
}

#[tokio::test]
async fn shutdown_stops_every_service_and_refuses_requests() {
    let container = booted().await;
    let running = container.registry().len();

    let stopped = container.shutdown().await;

    assert_eq!(stopped, running);
    assert_eq!(container.process_state(), ProcessState::Stopping);
    assert!(container.registry().services().iter().all(|s| s.state == ServiceState::Defined));
    let err = container
        .execute(Operation::add(elytron::address("simple-role-decoder", "late"), [("attribute", "groups")]).into())
        .await
        .unwrap_err();
    assert!(matches!(err, ContainerError::InvalidState { .. }));
}
