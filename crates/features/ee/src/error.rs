/// Task submission failures of a managed executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    #[error("Executor {executor} rejected the task: {in_flight} task(s) in flight, capacity {capacity}")]
    Rejected { executor: String, in_flight: usize, capacity: usize },

    #[error("Executor {executor} is shut down")]
    Shutdown { executor: String },
}
