use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Lifecycle of a registered service.
///
/// ```text
/// DEFINED -> DEPENDENCIES_RESOLVING -> STARTING -> UP -> STOPPING -> DEFINED | REMOVED
///                    |                    |                  |
///                    +------------------> FAILED <-----------+
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    Defined,
    DependenciesResolving,
    Starting,
    Up,
    Stopping,
    Removed,
    Failed,
}

impl ServiceState {
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use ServiceState::{
            Defined, DependenciesResolving, Failed, Removed, Starting, Stopping, Up,
        };
        matches!(
            (self, next),
            (Defined, DependenciesResolving | Removed)
                | (DependenciesResolving, Starting | Defined | Failed)
                | (Starting, Up | Failed)
                | (Up, Stopping)
                | (Stopping, Defined | Removed | Failed)
                | (Failed, Removed | Defined)
        )
    }

    /// Activation is underway or complete.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::DependenciesResolving | Self::Starting | Self::Up)
    }

    /// No activation task is running for the service.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Defined | Self::Up | Self::Failed | Self::Removed)
    }
}

/// Container-wide state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ProcessState {
    Starting,
    Running,
    /// A committed change only takes effect after the container reloads.
    ReloadRequired,
    Stopping,
}
