//! # Configuration Model
//!
//! The container's configuration lives in a tree of [`Resource`]s addressed by
//! [`PathAddress`](capstan_domain::PathAddress). This crate owns that tree:
//!
//! * [`ConfigurationModel`] is the single mutable owner. `add`, `remove`, and
//!   `write_attribute` are pure data operations validated against a [`SchemaProvider`];
//!   they never touch running services.
//! * [`ModelSnapshot`] is an immutable, versioned view that readers can hold while the model
//!   keeps changing.
//! * [`ResourceSchema`] and [`AttributeDefinition`] describe what each resource type accepts.
//!
//! ```rust
//! use capstan_domain::{AddressPattern, Attributes, PathAddress};
//! use capstan_model::{AttributeDefinition, ConfigurationModel, PatternTable, ResourceSchema};
//! use std::sync::Arc;
//!
//! let mut schemas = PatternTable::new();
//! schemas.insert(
//!     AddressPattern::subsystem("ee"),
//!     Arc::new(ResourceSchema::new().attribute(AttributeDefinition::boolean("annotation-property-replacement"))),
//! );
//! let mut model = ConfigurationModel::new(Arc::new(schemas));
//! model.add(&PathAddress::subsystem("ee"), &Attributes::new()).unwrap();
//! assert_eq!(model.version(), 1);
//! ```

mod error;
mod model;
mod resource;
mod schema;

pub use error::{AttributeViolation, ModelError};
pub use model::{ConfigurationModel, ModelSnapshot};
pub use resource::Resource;
pub use schema::{
    AttributeDefinition, Constraint, PatternTable, ResourceSchema, RestartPolicy, SchemaProvider,
};
