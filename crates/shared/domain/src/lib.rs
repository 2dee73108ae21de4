//! # Domain Models
//!
//! Pure data shared by every Capstan crate: resource addresses, attribute values,
//! operations and composite requests, service and capability names, lifecycle states,
//! events, and configuration. Keep it lean: no I/O and no runtime logic.

pub mod address;
pub mod capabilities;
pub mod config;
pub mod events;
pub mod names;
pub mod operation;
pub mod state;
pub mod value;

pub use address::{AddressPattern, PathAddress, PathElement};
pub use names::{CapabilityName, ServiceName};
pub use operation::{Attributes, CompositeRequest, Operation, OperationHeaders, OperationKind};
pub use state::{ProcessState, ServiceState};
pub use value::{ModelType, ModelValue};
