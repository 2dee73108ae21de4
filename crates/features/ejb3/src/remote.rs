use crate::remoting::RemotingConnector;
use capstan_controller::{ResolveContext, ServiceDefinitionProvider};
use capstan_domain::capabilities::{EJB_REMOTE, REMOTING_CONNECTOR, dynamic};
use capstan_domain::{PathAddress, ServiceName};
use capstan_model::{AttributeDefinition, AttributeViolation, ResourceSchema, RestartPolicy};
use capstan_services::{
    ActivationError, Dependency, Service, ServiceDefinition, ServiceValue, StartContext, async_trait,
};
use std::sync::Arc;
use tracing::info;

const CONNECTOR_KEY: &str = "connector";

/// The EJB remote invocation endpoint, bound to one remoting connector.
#[derive(Debug)]
pub struct RemoteService {
    pub cluster: String,
    pub execute_in_worker: bool,
    pub connector: Arc<RemotingConnector>,
}

pub(crate) fn schema() -> ResourceSchema {
    ResourceSchema::new()
        .attribute(
            AttributeDefinition::string("connector-ref")
                .required()
                .references(REMOTING_CONNECTOR)
                .restart(RestartPolicy::ResourceServices),
        )
        .attribute(AttributeDefinition::string("cluster").default_value("ejb").restart(RestartPolicy::ResourceServices))
        .attribute(
            AttributeDefinition::boolean("execute-in-worker")
                .default_value(true)
                .restart(RestartPolicy::ResourceServices),
        )
}

/// `service=remote` is a singleton, so its service name is the static capability.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RemoteServiceProvider;

impl ServiceDefinitionProvider for RemoteServiceProvider {
    fn service_name(&self, _address: &PathAddress) -> ServiceName {
        EJB_REMOTE.into()
    }

    fn definition(&self, ctx: &ResolveContext<'_>) -> Result<ServiceDefinition, AttributeViolation> {
        let connector = ctx.string("connector-ref")?;
        let service = RemoteStarter {
            cluster: ctx.string("cluster")?,
            execute_in_worker: ctx.boolean("execute-in-worker")?,
        };
        Ok(ServiceDefinition::new(self.service_name(ctx.address()), service)
            .requires(Dependency::capability(dynamic(REMOTING_CONNECTOR, &connector)).inject_as(CONNECTOR_KEY))
            .provides(EJB_REMOTE))
    }
}

struct RemoteStarter {
    cluster: String,
    execute_in_worker: bool,
}

#[async_trait]
impl Service for RemoteStarter {
    async fn start(&self, ctx: &StartContext) -> Result<ServiceValue, ActivationError> {
        let connector: Arc<RemotingConnector> = ctx.get(CONNECTOR_KEY)?;
        info!(connector = %connector.name(), cluster = %self.cluster, "EJB remote service started");
        Ok(Arc::new(RemoteService {
            cluster: self.cluster.clone(),
            execute_in_worker: self.execute_in_worker,
            connector,
        }))
    }

    async fn stop(&self, _value: ServiceValue) -> Result<(), ActivationError> {
        info!("EJB remote service stopped");
        Ok(())
    }
}
