use crate::error::ContainerError;
use capstan_controller::{ExecutionOutcome, Extension, ModelController, ResourceDefinitionRegistry};
use capstan_domain::config::KernelConfig;
use capstan_domain::{CompositeRequest, ProcessState};
use capstan_event_bus::EventBus;
use capstan_model::ModelSnapshot;
use capstan_services::{ServiceRegistry, VerificationReport};
use std::fmt::{self, Debug, Formatter};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// A configured container: the model controller, the service registry behind it, and the
/// extensions that defined its resource types.
#[derive(Clone)]
pub struct Container {
    config: KernelConfig,
    controller: ModelController,
    extensions: Vec<&'static str>,
}

impl Debug for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.config.container.name)
            .field("extensions", &self.extensions)
            .field("state", &self.controller.process_state())
            .finish_non_exhaustive()
    }
}

#[must_use = "The builder must be consumed by `build`"]
pub struct ContainerBuilder {
    config: KernelConfig,
    events: Option<EventBus>,
    extensions: Vec<Box<dyn Extension>>,
}

impl Debug for ContainerBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("extensions", &self.extensions.iter().map(|e| e.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ContainerBuilder {
    pub fn config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares an existing bus instead of creating one.
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn extension(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    /// Every subsystem compiled into this build.
    pub fn default_extensions(mut self) -> Self {
        self.extensions.extend(crate::features::extensions());
        self
    }

    /// # Errors
    ///
    /// [`ContainerError::DuplicateSubsystem`] when two extensions claim the same subsystem.
    pub fn build(self) -> Result<Container, ContainerError> {
        let mut claimed: Vec<(&'static str, &'static str)> = Vec::new();
        let mut definitions = ResourceDefinitionRegistry::new();
        for extension in &self.extensions {
            for &subsystem in extension.subsystems() {
                if let Some(&(_, first)) = claimed.iter().find(|(s, _)| *s == subsystem) {
                    return Err(ContainerError::DuplicateSubsystem {
                        subsystem,
                        first,
                        second: extension.name(),
                    });
                }
                claimed.push((subsystem, extension.name()));
            }
            extension.register(&mut definitions);
        }

        let events = self.events.unwrap_or_default();
        let registry = ServiceRegistry::with_events(events.clone());
        let controller = ModelController::new(definitions, registry, events);
        let extensions: Vec<&'static str> = self.extensions.iter().map(|e| e.name()).collect();
        info!(
            container = %self.config.container.name,
            extensions = ?extensions,
            resource_types = controller.definitions().len(),
            "Container built"
        );
        Ok(Container { config: self.config, controller, extensions })
    }
}

impl Container {
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder { config: KernelConfig::default(), events: None, extensions: Vec::new() }
    }

    /// Applies `requests` in the boot stage, waits for their services to settle within the
    /// configured boot timeout, and moves the container to `Running`.
    ///
    /// # Errors
    ///
    /// * [`ContainerError::InvalidState`] unless the container is still starting.
    /// * [`ContainerError::BootRequest`] when a request fails; earlier requests stay applied.
    /// * [`ContainerError::BootVerification`] when a service failed or did not come up in time.
    #[instrument(skip_all, fields(container = %self.config.container.name))]
    pub async fn boot(
        &self,
        requests: impl IntoIterator<Item = CompositeRequest>,
    ) -> Result<VerificationReport, ContainerError> {
        self.require(ProcessState::Starting, "boot")?;
        let started = Instant::now();
        let deadline = started + self.config.activation.boot_timeout();

        let mut outcomes = Vec::new();
        for (i, request) in requests.into_iter().enumerate() {
            let outcome = self
                .controller
                .execute_boot(request)
                .await
                .map_err(|source| ContainerError::BootRequest { request: i + 1, source })?;
            outcomes.push(outcome);
        }

        let mut report = VerificationReport::default();
        for mut outcome in outcomes {
            let remaining = deadline.saturating_duration_since(Instant::now());
            merge(&mut report, outcome.verify(Some(remaining)).await);
        }
        if !report.is_success() {
            warn!(failed = ?report.failed, timed_out = ?report.timed_out, "Boot did not settle");
            return Err(ContainerError::BootVerification { report });
        }

        self.controller.set_process_state(ProcessState::Running);
        info!(
            services = report.up.len(),
            resources = self.controller.snapshot().len(),
            elapsed = ?started.elapsed(),
            "Container booted"
        );
        Ok(report)
    }

    /// Applies a runtime request.
    ///
    /// # Errors
    ///
    /// [`ContainerError::InvalidState`] once shutdown began, otherwise the request's
    /// [`ControllerError`](capstan_controller::ControllerError).
    pub async fn execute(&self, request: CompositeRequest) -> Result<ExecutionOutcome, ContainerError> {
        let state = self.controller.process_state();
        if state == ProcessState::Stopping {
            return Err(ContainerError::InvalidState { action: "execute requests", state });
        }
        Ok(self.controller.execute(request).await?)
    }

    /// Stops every service, dependents first. Returns how many stopped cleanly.
    pub async fn shutdown(&self) -> usize {
        self.controller.set_process_state(ProcessState::Stopping);
        let total = self.controller.registry().len();
        let stopped = self.controller.registry().stop_all(self.config.activation.stop_timeout()).await;
        info!(container = %self.config.container.name, stopped, total, "Container stopped");
        stopped
    }

    fn require(&self, expected: ProcessState, action: &'static str) -> Result<(), ContainerError> {
        let state = self.controller.process_state();
        if state == expected { Ok(()) } else { Err(ContainerError::InvalidState { action, state }) }
    }

    #[must_use]
    pub const fn controller(&self) -> &ModelController {
        &self.controller
    }

    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        self.controller.registry()
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        self.controller.events()
    }

    #[must_use]
    pub const fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Names of the registered extensions, in registration order.
    #[must_use]
    pub fn extensions(&self) -> &[&'static str] {
        &self.extensions
    }

    #[must_use]
    pub fn process_state(&self) -> ProcessState {
        self.controller.process_state()
    }

    #[must_use]
    pub fn snapshot(&self) -> ModelSnapshot {
        self.controller.snapshot()
    }
}

fn merge(into: &mut VerificationReport, report: VerificationReport) {
    into.up.extend(report.up);
    into.failed.extend(report.failed);
    into.cancelled.extend(report.cancelled);
    into.timed_out.extend(report.timed_out);
}
