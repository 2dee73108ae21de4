use crate::context::ContextService;
use crate::executor::{ExecutorSettings, ManagedExecutor, RejectPolicy};
use capstan_controller::{ResolveContext, ServiceDefinitionProvider};
use capstan_domain::capabilities::{EE_CONTEXT_SERVICE, EE_MANAGED_EXECUTOR, dynamic};
use capstan_domain::{PathAddress, ServiceName};
use capstan_model::{AttributeDefinition, AttributeViolation, ResourceSchema, RestartPolicy};
use capstan_services::{
    ActivationError, Dependency, Service, ServiceDefinition, ServiceValue, StartContext,
    async_trait,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const CONTEXT_KEY: &str = "context-service";

pub(crate) fn schema() -> ResourceSchema {
    let sizing = |name: &str, min: i64, default: i32| {
        AttributeDefinition::int(name)
            .range(min, i64::from(i32::MAX))
            .default_value(default)
            .restart(RestartPolicy::ResourceServices)
    };
    ResourceSchema::new()
        .attribute(AttributeDefinition::string("jndi-name").required().length(1, 512))
        .attribute(
            AttributeDefinition::string("context-service")
                .references(EE_CONTEXT_SERVICE)
                .restart(RestartPolicy::ResourceServices),
        )
        .attribute(AttributeDefinition::long("hung-task-threshold").range(0, i64::MAX).default_value(0_i64))
        .attribute(AttributeDefinition::boolean("long-running-tasks").default_value(false))
        .attribute(sizing("core-threads", 0, 5))
        .attribute(sizing("max-threads", 1, 25))
        .attribute(AttributeDefinition::long("keepalive-time").range(0, i64::MAX).default_value(60_000_i64))
        .attribute(sizing("queue-length", 0, 0))
        .attribute(
            AttributeDefinition::string("reject-policy")
                .one_of(["ABORT", "RETRY_ABORT"])
                .default_value("ABORT")
                .restart(RestartPolicy::ResourceServices),
        )
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ManagedExecutorProvider;

impl ServiceDefinitionProvider for ManagedExecutorProvider {
    fn service_name(&self, address: &PathAddress) -> ServiceName {
        dynamic(EE_MANAGED_EXECUTOR, address.name().unwrap_or_default()).as_str().into()
    }

    fn definition(&self, ctx: &ResolveContext<'_>) -> Result<ServiceDefinition, AttributeViolation> {
        let settings = settings(ctx)?;
        let service = ExecutorService {
            name: ctx.name().to_owned(),
            jndi_name: ctx.string("jndi-name")?,
            settings,
        };
        let mut definition = ServiceDefinition::new(self.service_name(ctx.address()), service)
            .provides(dynamic(EE_MANAGED_EXECUTOR, ctx.name()));
        if let Some(context) = ctx.optional_capability(EE_CONTEXT_SERVICE, "context-service") {
            definition = definition.requires(Dependency::capability(context).inject_as(CONTEXT_KEY));
        }
        Ok(definition)
    }
}

fn settings(ctx: &ResolveContext<'_>) -> Result<ExecutorSettings, AttributeViolation> {
    let count = |name: &str| {
        ctx.int(name).and_then(|v| {
            usize::try_from(v).map_err(|_| AttributeViolation::new(name, "must not be negative"))
        })
    };
    let millis = |name: &str| {
        ctx.long(name).and_then(|v| {
            u64::try_from(v)
                .map(Duration::from_millis)
                .map_err(|_| AttributeViolation::new(name, "must not be negative"))
        })
    };

    let core_threads = count("core-threads")?;
    let max_threads = count("max-threads")?;
    if core_threads > max_threads {
        return Err(AttributeViolation::new(
            "core-threads",
            format!("{core_threads} exceeds max-threads ({max_threads})"),
        ));
    }
    let reject_policy = ctx
        .string("reject-policy")?
        .parse::<RejectPolicy>()
        .map_err(|_| AttributeViolation::new("reject-policy", "unknown reject policy"))?;
    let hung_task_threshold = Some(millis("hung-task-threshold")?).filter(|d| !d.is_zero());

    Ok(ExecutorSettings {
        core_threads,
        max_threads,
        keepalive: millis("keepalive-time")?,
        queue_length: count("queue-length")?,
        hung_task_threshold,
        long_running_tasks: ctx.boolean("long-running-tasks")?,
        reject_policy,
    })
}

struct ExecutorService {
    name: String,
    jndi_name: String,
    settings: ExecutorSettings,
}

#[async_trait]
impl Service for ExecutorService {
    async fn start(&self, ctx: &StartContext) -> Result<ServiceValue, ActivationError> {
        let context = ctx.optional::<ContextService>(CONTEXT_KEY);
        info!(
            executor = %self.name,
            jndi_name = %self.jndi_name,
            max_threads = self.settings.max_threads,
            queue_length = self.settings.queue_length,
            reject_policy = %self.settings.reject_policy,
            "Managed executor service started"
        );
        Ok(Arc::new(ManagedExecutor::new(
            self.name.clone(),
            self.jndi_name.clone(),
            context,
            self.settings.clone(),
        )))
    }

    async fn stop(&self, value: ServiceValue) -> Result<(), ActivationError> {
        let executor = value
            .downcast::<ManagedExecutor>()
            .map_err(|_| ActivationError::stop("runtime value is not a managed executor"))?;
        executor.shutdown();
        Ok(())
    }
}
