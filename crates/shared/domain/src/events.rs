//! Events published on the container's event bus.

use crate::names::ServiceName;
use crate::state::{ProcessState, ServiceState};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A service moved between lifecycle states.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceTransition {
    pub service: ServiceName,
    pub from: ServiceState,
    pub to: ServiceState,
    pub at: DateTime<Utc>,
}

/// A composite request was applied and its runtime batch committed.
#[derive(Debug, Clone, Serialize)]
pub struct ModelCommitted {
    pub request_id: String,
    pub version: u64,
    pub steps: usize,
    pub at: DateTime<Utc>,
}

/// A composite request failed and its applied steps were reverted.
#[derive(Debug, Clone, Serialize)]
pub struct ModelRolledBack {
    pub request_id: String,
    /// 1-indexed step that failed.
    pub step: usize,
    pub reason: String,
    /// `false` when an undo itself failed and the model needs reconciliation.
    pub clean: bool,
    pub at: DateTime<Utc>,
}

/// The container changed its process state.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessStateChanged {
    pub from: ProcessState,
    pub to: ProcessState,
    pub at: DateTime<Utc>,
}
