use crate::error::RegistryError;
use capstan_domain::{CapabilityName, ServiceName};
use fxhash::FxHashMap;

/// Which service currently provides each capability. At most one provider per name.
#[derive(Debug, Clone, Default)]
pub struct CapabilityDirectory {
    providers: FxHashMap<CapabilityName, ServiceName>,
}

impl CapabilityDirectory {
    #[must_use]
    pub fn resolve(&self, capability: &CapabilityName) -> Option<&ServiceName> {
        self.providers.get(capability)
    }

    /// Capabilities published by `service`, sorted.
    #[must_use]
    pub fn provided_by(&self, service: &ServiceName) -> Vec<&CapabilityName> {
        let mut provided: Vec<_> =
            self.providers.iter().filter(|(_, p)| *p == service).map(|(c, _)| c).collect();
        provided.sort();
        provided
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Fails if any of `capabilities` is held by a provider other than `provider`.
    pub(crate) fn check_available<'a>(
        &self,
        capabilities: impl IntoIterator<Item = &'a CapabilityName>,
        provider: &ServiceName,
    ) -> Result<(), RegistryError> {
        for capability in capabilities {
            match self.providers.get(capability) {
                Some(current) if current != provider => {
                    return Err(RegistryError::CapabilityAlreadyProvided {
                        capability: capability.clone(),
                        provider: current.clone(),
                    });
                },
                _ => {},
            }
        }
        Ok(())
    }

    pub(crate) fn publish(
        &mut self,
        capability: CapabilityName,
        provider: ServiceName,
    ) -> Result<(), RegistryError> {
        self.check_available([&capability], &provider)?;
        self.providers.insert(capability, provider);
        Ok(())
    }

    pub(crate) fn unpublish(&mut self, capability: &CapabilityName) -> Option<ServiceName> {
        self.providers.remove(capability)
    }

    pub(crate) fn unpublish_all(&mut self, provider: &ServiceName) {
        let provided: Vec<CapabilityName> =
            self.provided_by(provider).into_iter().cloned().collect();
        for capability in &provided {
            self.unpublish(capability);
        }
    }
}
