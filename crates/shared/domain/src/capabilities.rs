//! Well-known capability base names.
//!
//! Most of these are dynamic: a resource named `foo` registers `<base>.foo`.
//! Use [`dynamic`] to build the concrete name.

use crate::names::CapabilityName;

pub const EE_CONTEXT_SERVICE: &str = "org.wildfly.ee.concurrent.context.service";
pub const EE_MANAGED_EXECUTOR: &str = "org.wildfly.ee.concurrent.executor";

pub const SECURITY_REALM: &str = "org.wildfly.security.security-realm";
pub const SECURITY_DOMAIN: &str = "org.wildfly.security.security-domain";
pub const PERMISSION_MAPPER: &str = "org.wildfly.security.permission-mapper";
pub const ROLE_DECODER: &str = "org.wildfly.security.role-decoder";
pub const SASL_SERVER_FACTORY: &str = "org.wildfly.security.sasl-server-factory";
pub const SASL_AUTHENTICATION_FACTORY: &str = "org.wildfly.security.sasl-authentication-factory";
pub const HTTP_SERVER_MECHANISM_FACTORY: &str =
    "org.wildfly.security.http-server-mechanism-factory";
pub const HTTP_AUTHENTICATION_FACTORY: &str = "org.wildfly.security.http-authentication-factory";

pub const REMOTING_CONNECTOR: &str = "org.wildfly.remoting.connector";
pub const UNDERTOW_LISTENER: &str = "org.wildfly.undertow.listener";

pub const EJB_APPLICATION_SECURITY_DOMAIN: &str = "org.wildfly.ejb3.application-security-domain";
pub const EJB_REMOTE: &str = "org.wildfly.ejb3.remote";
pub const UNDERTOW_APPLICATION_SECURITY_DOMAIN: &str =
    "org.wildfly.undertow.application-security-domain";

/// `<base>.<name>`
#[must_use]
pub fn dynamic(base: &str, name: &str) -> CapabilityName {
    CapabilityName::new(format!("{base}.{name}"))
}
