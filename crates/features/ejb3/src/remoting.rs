use capstan_controller::{ResolveContext, ServiceDefinitionProvider};
use capstan_domain::capabilities::{REMOTING_CONNECTOR, SASL_AUTHENTICATION_FACTORY, UNDERTOW_LISTENER, dynamic};
use capstan_domain::{PathAddress, ServiceName};
use capstan_elytron::SaslAuthenticationFactory;
use capstan_model::{AttributeDefinition, AttributeViolation, ResourceSchema, RestartPolicy};
use capstan_services::{
    ActivationError, Dependency, Service, ServiceDefinition, ServiceValue, StartContext, async_trait,
};
use capstan_undertow::HttpListener;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use tracing::info;

const LISTENER_KEY: &str = "listener";
const SASL_KEY: &str = "sasl-authentication-factory";

/// A remoting endpoint reached through an HTTP upgrade on an Undertow listener.
pub struct RemotingConnector {
    name: String,
    listener: Arc<HttpListener>,
    sasl: Option<Arc<SaslAuthenticationFactory>>,
}

impl RemotingConnector {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn listener(&self) -> &HttpListener {
        &self.listener
    }

    /// Unset means connections are not authenticated by this connector.
    #[must_use]
    pub fn sasl_authentication_factory(&self) -> Option<&SaslAuthenticationFactory> {
        self.sasl.as_deref()
    }

    /// `http-remoting://host:port`
    #[must_use]
    pub fn uri(&self) -> String {
        format!("http-remoting://{}:{}", self.listener.host, self.listener.port)
    }
}

impl Debug for RemotingConnector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemotingConnector")
            .field("name", &self.name)
            .field("listener", &self.listener.name)
            .field("sasl", &self.sasl.as_ref().map(|s| s.name()))
            .finish()
    }
}

pub(crate) fn schema() -> ResourceSchema {
    ResourceSchema::new()
        .attribute(
            AttributeDefinition::string("connector-ref")
                .required()
                .references(UNDERTOW_LISTENER)
                .restart(RestartPolicy::ResourceServices),
        )
        .attribute(
            AttributeDefinition::string("sasl-authentication-factory")
                .references(SASL_AUTHENTICATION_FACTORY)
                .restart(RestartPolicy::ResourceServices),
        )
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct HttpConnectorProvider;

impl ServiceDefinitionProvider for HttpConnectorProvider {
    fn service_name(&self, address: &PathAddress) -> ServiceName {
        dynamic(REMOTING_CONNECTOR, address.name().unwrap_or_default()).as_str().into()
    }

    fn definition(&self, ctx: &ResolveContext<'_>) -> Result<ServiceDefinition, AttributeViolation> {
        let mut definition = ServiceDefinition::new(
            self.service_name(ctx.address()),
            ConnectorService { name: ctx.name().to_owned() },
        )
        .requires(Dependency::capability(ctx.capability(UNDERTOW_LISTENER, "connector-ref")?).inject_as(LISTENER_KEY))
        .provides(dynamic(REMOTING_CONNECTOR, ctx.name()));
        if let Some(sasl) = ctx.optional_capability(SASL_AUTHENTICATION_FACTORY, "sasl-authentication-factory") {
            definition = definition.requires(Dependency::capability(sasl).inject_as(SASL_KEY));
        }
        Ok(definition)
    }
}

struct ConnectorService {
    name: String,
}

#[async_trait]
impl Service for ConnectorService {
    async fn start(&self, ctx: &StartContext) -> Result<ServiceValue, ActivationError> {
        let connector = RemotingConnector {
            name: self.name.clone(),
            listener: ctx.get(LISTENER_KEY)?,
            sasl: ctx.optional(SASL_KEY),
        };
        info!(
            connector = %connector.name,
            uri = %connector.uri(),
            authenticated = connector.sasl.is_some(),
            "Remoting connector started"
        );
        Ok(Arc::new(connector))
    }
}
