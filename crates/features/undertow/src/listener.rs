use capstan_controller::{ResolveContext, ServiceDefinitionProvider};
use capstan_domain::capabilities::{UNDERTOW_LISTENER, dynamic};
use capstan_domain::{PathAddress, ServiceName};
use capstan_model::{AttributeDefinition, AttributeViolation, ResourceSchema, RestartPolicy};
use capstan_services::{
    ActivationError, Service, ServiceDefinition, ServiceValue, StartContext, async_trait,
};
use std::sync::Arc;
use tracing::info;

/// An HTTP listener of an Undertow server. Remoting connectors upgrade connections on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpListener {
    pub name: String,
    pub server: String,
    pub host: String,
    pub port: u16,
    pub enabled: bool,
}

pub(crate) fn server_schema() -> ResourceSchema {
    ResourceSchema::new()
        .attribute(AttributeDefinition::string("default-host").default_value("default-host"))
        .attribute(AttributeDefinition::string("servlet-container").default_value("default"))
}

pub(crate) fn listener_schema() -> ResourceSchema {
    ResourceSchema::new()
        .attribute(
            AttributeDefinition::string("host")
                .default_value("127.0.0.1")
                .restart(RestartPolicy::ResourceServices),
        )
        .attribute(
            AttributeDefinition::int("port")
                .range(1, i64::from(u16::MAX))
                .default_value(8080)
                .restart(RestartPolicy::ResourceServices),
        )
        .attribute(AttributeDefinition::boolean("enabled").default_value(true).restart(RestartPolicy::ResourceServices))
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct HttpListenerProvider;

impl ServiceDefinitionProvider for HttpListenerProvider {
    fn service_name(&self, address: &PathAddress) -> ServiceName {
        dynamic(UNDERTOW_LISTENER, address.name().unwrap_or_default()).as_str().into()
    }

    fn definition(&self, ctx: &ResolveContext<'_>) -> Result<ServiceDefinition, AttributeViolation> {
        let port = ctx.int("port")?;
        let listener = HttpListener {
            name: ctx.name().to_owned(),
            server: ctx.address().value_of("server").unwrap_or_default().to_owned(),
            host: ctx.string("host")?,
            port: u16::try_from(port).map_err(|_| AttributeViolation::new("port", format!("{port} is not a port")))?,
            enabled: ctx.boolean("enabled")?,
        };
        Ok(ServiceDefinition::new(self.service_name(ctx.address()), ListenerService(listener))
            .provides(dynamic(UNDERTOW_LISTENER, ctx.name())))
    }
}

struct ListenerService(HttpListener);

#[async_trait]
impl Service for ListenerService {
    async fn start(&self, _ctx: &StartContext) -> Result<ServiceValue, ActivationError> {
        let listener = &self.0;
        info!(
            listener = %listener.name,
            server = %listener.server,
            address = %format_args!("{}:{}", listener.host, listener.port),
            enabled = listener.enabled,
            "HTTP listener registered"
        );
        Ok(Arc::new(listener.clone()))
    }

    async fn stop(&self, _value: ServiceValue) -> Result<(), ActivationError> {
        info!(listener = %self.0.name, "HTTP listener unregistered");
        Ok(())
    }
}
