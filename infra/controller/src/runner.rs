use crate::context::ResolveContext;
use crate::error::{ControllerError, OperationError};
use crate::executor::{self, AppliedOperation};
use crate::outcome::{RuntimeEffect, StepOutcome};
use crate::registry::{ResourceDefinition, ResourceDefinitionRegistry};
use capstan_domain::{Operation, PathAddress, ServiceState};
use capstan_model::{ConfigurationModel, ModelError, Resource, RestartPolicy};
use capstan_services::{BatchPlan, RuntimeAction};
use tracing::{debug, warn};

/// Applied steps of a request, newest last.
#[derive(Debug, Default)]
pub(crate) struct UndoLog {
    applied: Vec<(usize, AppliedOperation)>,
}

impl UndoLog {
    fn push(&mut self, step: usize, applied: AppliedOperation) {
        self.applied.push((step, applied));
    }

    /// Reverts every applied step, newest first, and reports the original failure.
    pub(crate) fn rollback(
        self,
        model: &mut ConfigurationModel,
        step: usize,
        address: PathAddress,
        source: OperationError,
    ) -> ControllerError {
        warn!(step, %address, error = %source, "Rolling back composite request");
        for (undo_step, applied) in self.applied.into_iter().rev() {
            for operation in &applied.undo {
                if let Err(rollback) = executor::apply(model, operation) {
                    warn!(undo_step, error = %rollback, "Undo failed, model needs reconciliation");
                    return ControllerError::RollbackFailed {
                        step,
                        address,
                        source,
                        undo_step,
                        rollback,
                    };
                }
            }
        }
        ControllerError::StepFailed { step, address, source }
    }
}

/// Model changes of a request, ready for the registry commit.
#[derive(Debug)]
pub(crate) struct Prepared {
    pub(crate) plan: BatchPlan,
    pub(crate) undo: UndoLog,
    pub(crate) steps: Vec<StepOutcome>,
    pub(crate) reload_required: bool,
}

/// Executes the steps of one composite request against the model, in order, while queuing
/// the runtime actions they imply on a [`BatchPlan`].
pub(crate) struct StepRunner<'a> {
    model: &'a mut ConfigurationModel,
    definitions: &'a ResourceDefinitionRegistry,
    plan: BatchPlan,
    booting: bool,
    allow_restart: bool,
    undo: UndoLog,
    steps: Vec<StepOutcome>,
    reload_required: bool,
}

impl<'a> StepRunner<'a> {
    pub(crate) fn new(
        model: &'a mut ConfigurationModel,
        definitions: &'a ResourceDefinitionRegistry,
        plan: BatchPlan,
        booting: bool,
        allow_restart: bool,
    ) -> Self {
        Self {
            model,
            definitions,
            plan,
            booting,
            allow_restart,
            undo: UndoLog::default(),
            steps: Vec::new(),
            reload_required: false,
        }
    }

    /// Runs every step, then checks that the queued runtime actions form a consistent
    /// service graph. On the first failure all applied steps are reverted.
    pub(crate) fn run(mut self, operations: &[Operation]) -> Result<Prepared, ControllerError> {
        for (index, operation) in operations.iter().enumerate() {
            let step = index + 1;
            if let Err(source) = self.step(step, operation) {
                return Err(self.undo.rollback(self.model, step, operation.address().clone(), source));
            }
        }

        if let Err((step, source)) = self.plan.verify() {
            let address = operations
                .get(step.saturating_sub(1))
                .map_or_else(PathAddress::root, |op| op.address().clone());
            return Err(self.undo.rollback(self.model, step, address, source.into()));
        }

        Ok(Prepared {
            plan: self.plan,
            undo: self.undo,
            steps: self.steps,
            reload_required: self.reload_required,
        })
    }

    fn step(&mut self, step: usize, operation: &Operation) -> Result<(), OperationError> {
        let applied = executor::apply(self.model, operation)?;
        debug!(step, operation = %operation.kind(), address = %operation.address(), "Step applied");
        let removed = applied.removed.clone();
        self.undo.push(step, applied);

        let mut runtime = Vec::new();
        match operation {
            Operation::Add { address, .. } => self.added(step, address, &mut runtime)?,
            Operation::Remove { .. } => self.removed(step, &removed, &mut runtime)?,
            Operation::WriteAttribute { address, name, .. } => {
                self.written(step, address, name, &mut runtime)?;
            },
        }

        if runtime.contains(&RuntimeEffect::ReloadRequired) {
            self.reload_required = true;
        }
        self.steps.push(StepOutcome {
            step,
            operation: operation.kind(),
            address: operation.address().clone(),
            runtime,
        });
        Ok(())
    }

    fn definition(&self, address: &PathAddress) -> Result<&'a ResourceDefinition, OperationError> {
        self.definitions
            .lookup(address)
            .ok_or_else(|| ModelError::UnknownResourceType { address: address.clone() }.into())
    }

    /// Runtime changes to this resource wait for the next reload.
    fn deferred(&self, definition: &ResourceDefinition) -> bool {
        definition.is_boot_only() && !self.booting
    }

    fn added(
        &mut self,
        step: usize,
        address: &PathAddress,
        runtime: &mut Vec<RuntimeEffect>,
    ) -> Result<(), OperationError> {
        let definition = self.definition(address)?;
        let Some(provider) = definition.services() else { return Ok(()) };
        if self.deferred(definition) {
            runtime.push(RuntimeEffect::ReloadRequired);
            return Ok(());
        }

        let service = self.resolve(address, definition)?;
        runtime.push(RuntimeEffect::Install(provider.service_name(address)));
        self.plan.push(step, RuntimeAction::Install(service))?;
        Ok(())
    }

    fn removed(
        &mut self,
        step: usize,
        removed: &[Resource],
        runtime: &mut Vec<RuntimeEffect>,
    ) -> Result<(), OperationError> {
        for resource in removed.iter().rev() {
            let definition = self.definition(resource.address())?;
            let Some(provider) = definition.services() else { continue };
            if self.deferred(definition) {
                if !runtime.contains(&RuntimeEffect::ReloadRequired) {
                    runtime.push(RuntimeEffect::ReloadRequired);
                }
                continue;
            }
            let name = provider.service_name(resource.address());
            if self.plan.contains(&name) {
                runtime.push(RuntimeEffect::Remove(name.clone()));
                self.plan.push(step, RuntimeAction::Remove(name))?;
            }
        }
        Ok(())
    }

    fn written(
        &mut self,
        step: usize,
        address: &PathAddress,
        attribute: &str,
        runtime: &mut Vec<RuntimeEffect>,
    ) -> Result<(), OperationError> {
        let definition = self.definition(address)?;
        let policy = definition
            .schema()
            .get(attribute)
            .map(capstan_model::AttributeDefinition::restart_policy)
            .unwrap_or_default();
        if policy == RestartPolicy::None {
            return Ok(());
        }
        if !self.booting && (policy == RestartPolicy::Reload || definition.is_boot_only()) {
            runtime.push(RuntimeEffect::ReloadRequired);
            return Ok(());
        }

        let Some(provider) = definition.services() else { return Ok(()) };
        let name = provider.service_name(address);
        let Some(state) = self.plan.service_state(&name) else { return Ok(()) };
        let live = state.is_active() || state == ServiceState::Stopping;
        if live && !self.allow_restart {
            return Err(OperationError::RestartRefused {
                address: address.clone(),
                attribute: attribute.to_owned(),
                service: name,
            });
        }

        let service = self.resolve(address, definition)?;
        runtime.push(RuntimeEffect::Replace(name));
        self.plan.push(step, RuntimeAction::Replace(service))?;
        Ok(())
    }

    fn resolve(
        &self,
        address: &PathAddress,
        definition: &ResourceDefinition,
    ) -> Result<capstan_services::ServiceDefinition, OperationError> {
        let Some(provider) = definition.services() else {
            return Err(ModelError::UnknownResourceType { address: address.clone() }.into());
        };
        let resource = self.model.get(address)?;
        let ctx = ResolveContext::new(resource, definition.schema(), &**self.model);
        provider.definition(&ctx).map_err(|violation| violation.at(address).into())
    }
}
