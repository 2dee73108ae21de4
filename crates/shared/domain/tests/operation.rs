use capstan_domain::{
    CompositeRequest, ModelValue, Operation, OperationHeaders, OperationKind, PathAddress,
};
use serde_json::json;

#[test]
fn composite_request_deserializes_from_boot_json() {
    let raw = json!({
        "id": "security-setup",
        "headers": "ALLOW_RESOURCE_SERVICE_RESTART",
        "steps": [
            {
                "operation": "add",
                "address": "/subsystem=elytron/properties-realm=app-UsersRoles",
                "attributes": { "users-properties": { "path": "users.properties", "plain-text": true } }
            },
            {
                "operation": "write-attribute",
                "address": "/subsystem=ejb3/service=remote",
                "name": "connector-ref",
                "value": "app"
            },
            { "operation": "remove", "address": "/subsystem=undertow/application-security-domain=app" }
        ]
    });

    let request: CompositeRequest = serde_json::from_value(raw).expect("request deserialize");
    assert_eq!(request.id.as_deref(), Some("security-setup"));
    assert!(request.allows_restart());
    assert_eq!(request.len(), 3);

    let kinds: Vec<_> = request.steps.iter().map(Operation::kind).collect();
    assert_eq!(kinds, [OperationKind::Add, OperationKind::WriteAttribute, OperationKind::Remove]);
    assert!(matches!(request.steps[2], Operation::Remove { cascade: false, .. }));

    let Operation::Add { attributes, .. } = &request.steps[0] else {
        panic!("first step is an add");
    };
    let users = &attributes["users-properties"];
    assert_eq!(users.get("plain-text"), Some(&ModelValue::Boolean(true)));
}

#[test]
fn headers_default_to_empty() {
    let request: CompositeRequest = serde_json::from_value(json!({ "steps": [] })).unwrap();
    assert_eq!(request.headers, OperationHeaders::empty());
    assert!(request.is_empty());
}

#[test]
fn builders_compose() {
    let realm = PathAddress::subsystem("elytron").append("properties-realm", "r");
    let request = CompositeRequest::new()
        .step(Operation::add(realm.clone(), [("groups-properties", ModelValue::Undefined)]))
        .step(Operation::remove_recursive(realm.clone()))
        .headers(OperationHeaders::ALLOW_RESOURCE_SERVICE_RESTART);

    assert_eq!(request.steps[0].address(), &realm);
    assert_eq!(request.steps[1].kind().to_string(), "remove");
    assert!(matches!(request.steps[1], Operation::Remove { cascade: true, .. }));
    assert!(request.allows_restart());
}
