//! Applies single operations to the model and records how to reverse them.

use capstan_domain::{ModelValue, Operation};
use capstan_model::{ConfigurationModel, ModelError, Resource};

/// A mutation that went through, with the operations that exactly reverse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedOperation {
    /// Apply in order to revert the mutation.
    pub undo: Vec<Operation>,
    /// Resources deleted by a remove, parent first.
    pub removed: Vec<Resource>,
    /// Value replaced by an attribute write.
    pub prior: Option<ModelValue>,
}

/// Validates and applies `operation`. Nothing is mutated on error.
pub fn apply(
    model: &mut ConfigurationModel,
    operation: &Operation,
) -> Result<AppliedOperation, ModelError> {
    match operation {
        Operation::Add { address, attributes } => {
            model.add(address, attributes)?;
            Ok(AppliedOperation {
                undo: vec![Operation::remove(address.clone())],
                removed: Vec::new(),
                prior: None,
            })
        },
        Operation::Remove { address, cascade } => {
            let removed = model.remove(address, *cascade)?;
            let undo = removed
                .iter()
                .map(|r| Operation::Add {
                    address: r.address().clone(),
                    attributes: r.attributes().clone(),
                })
                .collect();
            Ok(AppliedOperation { undo, removed, prior: None })
        },
        Operation::WriteAttribute { address, name, value } => {
            let prior = model.write_attribute(address, name, value)?;
            Ok(AppliedOperation {
                undo: vec![Operation::write_attribute(address.clone(), name.clone(), prior.clone())],
                removed: Vec::new(),
                prior: Some(prior),
            })
        },
    }
}
