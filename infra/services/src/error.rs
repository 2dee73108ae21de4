use capstan_domain::{CapabilityName, ServiceName};
use std::borrow::Cow;

/// Registry refusals. When one of these is returned nothing in the registry changed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Service {name} is already registered")]
    DuplicateName { name: ServiceName },

    #[error("Service {name} is not registered")]
    NotRegistered { name: ServiceName },

    #[error("Cannot remove {name}: {dependent} still requires it")]
    StillDepended { name: ServiceName, dependent: ServiceName },

    #[error("Service {service} requires {dependency}, which nothing provides")]
    MissingDependency { service: ServiceName, dependency: String },

    #[error("Dependency cycle: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<ServiceName> },

    #[error("Service {service} cannot start: dependency {dependency} has failed")]
    DependencyFailed { service: ServiceName, dependency: ServiceName },

    #[error("Service {name} has failed; replace or remove it before starting it again")]
    ServiceFailed { name: ServiceName },

    #[error("Capability {capability} is already provided by {provider}")]
    CapabilityAlreadyProvided { capability: CapabilityName, provider: ServiceName },

    #[error("The registry changed while the batch was being prepared")]
    ConcurrentModification,

    #[error("Service {name} failed: {source}")]
    Activation { name: ServiceName, source: ActivationError },
}

impl RegistryError {
    /// The dependency graph cannot be satisfied.
    #[must_use]
    pub const fn is_dependency_error(&self) -> bool {
        matches!(
            self,
            Self::MissingDependency { .. }
                | Self::CyclicDependency { .. }
                | Self::DependencyFailed { .. }
                | Self::ServiceFailed { .. }
                | Self::StillDepended { .. }
        )
    }
}

/// A service's own start or stop logic failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivationError {
    #[error("Start failed{}: {message}", format_context(.context))]
    Start { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Stop failed{}: {message}", format_context(.context))]
    Stop { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Required dependency {dependency} did not come up")]
    DependencyUnavailable { dependency: ServiceName },

    #[error("Injected value '{key}' is missing or has an unexpected type")]
    Injection { key: String },
}

impl ActivationError {
    pub fn start(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Start { message: message.into(), context: None }
    }

    pub fn stop(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Stop { message: message.into(), context: None }
    }

    #[must_use]
    pub fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        match self {
            Self::Start { message, .. } => Self::Start { message, context: Some(context.into()) },
            Self::Stop { message, .. } => Self::Stop { message, context: Some(context.into()) },
            other => other,
        }
    }
}

/// Attaches a human-readable context to a failing activation call.
pub trait ActivationErrorExt<T> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, ActivationError>;
}

impl<T> ActivationErrorExt<T> for Result<T, ActivationError> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, ActivationError> {
        self.map_err(|e| e.context(context))
    }
}

/// A batch commit could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Runtime action for step {origin} failed: {source}")]
pub struct CommitError {
    /// Index of the step that queued the failing action.
    pub origin: usize,
    #[source]
    pub source: RegistryError,
    /// Earlier actions of the batch already reached the registry.
    pub partially_applied: bool,
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

fn format_cycle(cycle: &[ServiceName]) -> String {
    cycle.iter().map(ServiceName::as_str).collect::<Vec<_>>().join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_is_rendered_as_a_path() {
        let err = RegistryError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Dependency cycle: a -> b -> a");
        assert!(err.is_dependency_error());
    }

    #[test]
    fn activation_context_is_appended() {
        let err: Result<(), _> = Err(ActivationError::start("port in use"));
        let err = err.context("binding listener").unwrap_err();
        assert_eq!(err.to_string(), "Start failed (binding listener): port in use");
    }
}
