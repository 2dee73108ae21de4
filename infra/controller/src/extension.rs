use crate::registry::ResourceDefinitionRegistry;

/// A unit that contributes resource types for one or more subsystems.
pub trait Extension: Send + Sync {
    /// Short name used in logs, e.g. `elytron`.
    fn name(&self) -> &'static str;

    /// Subsystems the extension owns.
    fn subsystems(&self) -> &'static [&'static str];

    fn register(&self, definitions: &mut ResourceDefinitionRegistry);
}
