use crate::error::{ControllerError, OperationError};
use crate::outcome::ExecutionOutcome;
use crate::registry::ResourceDefinitionRegistry;
use crate::runner::StepRunner;
use capstan_domain::events::{ModelCommitted, ModelRolledBack, ProcessStateChanged};
use capstan_domain::{CompositeRequest, ModelValue, Operation, PathAddress, ProcessState};
use capstan_event_bus::EventBus;
use capstan_kernel::request_id;
use capstan_model::{ConfigurationModel, ModelError, ModelSnapshot};
use capstan_services::{CommitError, ServiceRegistry};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{Instrument, Span, debug, info, instrument, warn};

struct Inner {
    model: Mutex<ConfigurationModel>,
    definitions: Arc<ResourceDefinitionRegistry>,
    registry: ServiceRegistry,
    events: EventBus,
    snapshots: watch::Sender<ModelSnapshot>,
    process: watch::Sender<ProcessState>,
}

/// Entry point for configuration changes.
///
/// Composite requests are serialized: each one holds the model from its first step until
/// its runtime batch is committed or rolled back, even if the caller drops the future. Readers use [`snapshot`](Self::snapshot) and only ever
/// see committed states.
#[derive(Clone)]
pub struct ModelController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ModelController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelController")
            .field("version", &self.inner.snapshots.borrow().version())
            .field("process", &*self.inner.process.borrow())
            .finish_non_exhaustive()
    }
}

impl ModelController {
    pub fn new(
        definitions: ResourceDefinitionRegistry,
        registry: ServiceRegistry,
        events: EventBus,
    ) -> Self {
        let definitions = Arc::new(definitions);
        let model = ConfigurationModel::new(definitions.clone());
        let (snapshots, _) = watch::channel(model.snapshot());
        let (process, _) = watch::channel(ProcessState::Starting);
        Self {
            inner: Arc::new(Inner {
                model: Mutex::new(model),
                definitions,
                registry,
                events,
                snapshots,
                process,
            }),
        }
    }

    /// Applies a request to the running container.
    pub async fn execute(
        &self,
        request: CompositeRequest,
    ) -> Result<ExecutionOutcome, ControllerError> {
        self.run(request, false).await
    }

    /// Applies a boot request: boot-only resources get their services installed.
    pub async fn execute_boot(
        &self,
        request: CompositeRequest,
    ) -> Result<ExecutionOutcome, ControllerError> {
        self.run(request, true).await
    }

    /// Runs the request on its own task so a caller that stops polling cannot leave the
    /// model between apply and commit.
    async fn run(
        &self,
        request: CompositeRequest,
        booting: bool,
    ) -> Result<ExecutionOutcome, ControllerError> {
        let controller = self.clone();
        let task = tokio::spawn(
            async move { controller.apply(request, booting).await }.instrument(Span::current()),
        );
        match task.await {
            Ok(result) => result,
            Err(error) => std::panic::resume_unwind(error.into_panic()),
        }
    }

    #[instrument(
        name = "composite",
        skip_all,
        fields(request_id = tracing::field::Empty, steps = request.len(), boot = booting)
    )]
    async fn apply(
        &self,
        request: CompositeRequest,
        booting: bool,
    ) -> Result<ExecutionOutcome, ControllerError> {
        let request_id = request.id.clone().unwrap_or_else(|| request_id!());
        Span::current().record("request_id", request_id.as_str());

        let mut model = self.inner.model.lock().await;
        let runner = StepRunner::new(
            &mut model,
            &self.inner.definitions,
            self.inner.registry.plan(),
            booting,
            request.allows_restart(),
        );
        let prepared = match runner.run(&request.steps) {
            Ok(prepared) => prepared,
            Err(error) => {
                self.rolled_back(&request_id, &error);
                return Err(error);
            },
        };

        debug!(actions = prepared.plan.len(), "Committing runtime batch");
        let verification = match self.inner.registry.commit(prepared.plan).await {
            Ok(verification) => verification,
            Err(CommitError { origin, source, partially_applied }) => {
                let address = request
                    .steps
                    .get(origin.saturating_sub(1))
                    .map_or_else(PathAddress::root, |op| op.address().clone());
                let error = if partially_applied {
                    ControllerError::Inconsistent { step: origin, address, source }
                } else {
                    prepared.undo.rollback(
                        &mut model,
                        origin,
                        address,
                        OperationError::Registry(source),
                    )
                };
                self.rolled_back(&request_id, &error);
                return Err(error);
            },
        };

        let snapshot = model.snapshot();
        let version = snapshot.version();
        self.inner.snapshots.send_replace(snapshot);
        drop(model);

        if prepared.reload_required {
            self.set_process_state(ProcessState::ReloadRequired);
        }
        info!(version, steps = request.len(), "Composite request committed");
        self.inner.events.publish(ModelCommitted {
            request_id: request_id.clone(),
            version,
            steps: request.len(),
            at: Utc::now(),
        });

        Ok(ExecutionOutcome {
            request_id,
            version,
            steps: prepared.steps,
            reload_required: prepared.reload_required,
            headers: request.headers,
            verification,
        })
    }

    fn rolled_back(&self, request_id: &str, error: &ControllerError) {
        warn!(step = error.step(), kind = %error.kind(), error = %error, "Composite request failed");
        self.inner.events.publish(ModelRolledBack {
            request_id: request_id.to_owned(),
            step: error.step(),
            reason: error.to_string(),
            clean: error.is_clean(),
            at: Utc::now(),
        });
    }

    /// Latest committed model.
    #[must_use]
    pub fn snapshot(&self) -> ModelSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    /// Notified with every committed model.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ModelSnapshot> {
        self.inner.snapshots.subscribe()
    }

    pub fn read_resource(
        &self,
        address: &PathAddress,
        recursive: bool,
        include_defaults: bool,
    ) -> Result<ModelValue, ModelError> {
        self.snapshot().read_resource(address, recursive, include_defaults)
    }

    /// Effective attribute value, schema default applied.
    pub fn read_attribute(&self, address: &PathAddress, name: &str) -> Result<ModelValue, ModelError> {
        self.snapshot().resolve_attribute(address, name)
    }

    /// Composite request that recreates the committed model from scratch, parents first.
    #[must_use]
    pub fn describe(&self) -> CompositeRequest {
        self.snapshot()
            .iter()
            .map(|r| Operation::Add { address: r.address().clone(), attributes: r.attributes().clone() })
            .collect()
    }

    #[must_use]
    pub fn process_state(&self) -> ProcessState {
        *self.inner.process.borrow()
    }

    #[must_use]
    pub fn subscribe_process(&self) -> watch::Receiver<ProcessState> {
        self.inner.process.subscribe()
    }

    /// Moves the container to `state`. `RELOAD_REQUIRED` sticks until the container stops.
    pub fn set_process_state(&self, state: ProcessState) {
        let mut from = None;
        self.inner.process.send_if_modified(|current| {
            let sticky = *current == ProcessState::ReloadRequired && state == ProcessState::Running;
            if *current == state || sticky {
                return false;
            }
            from = Some(*current);
            *current = state;
            true
        });
        if let Some(from) = from {
            info!(%from, to = %state, "Process state changed");
            self.inner.events.publish(ProcessStateChanged { from, to: state, at: Utc::now() });
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.inner.registry
    }

    #[must_use]
    pub fn definitions(&self) -> &ResourceDefinitionRegistry {
        &self.inner.definitions
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }
}
