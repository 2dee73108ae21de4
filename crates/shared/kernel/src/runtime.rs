//! Tokio runtime profile for the container process.

use crate::domain::config::RuntimeConfig;
use crate::error::{KernelError, KernelErrorExt};
use std::thread::available_parallelism;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

const DEFAULT_WORKER_THREADS: usize = 4;
const MIN_STACK_SIZE: usize = 1024 * 1024;
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;
const THREAD_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Normalized runtime settings derived from [`RuntimeConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeProfile {
    pub worker_threads: usize,
    pub stack_size: usize,
    pub thread_name: String,
}

impl From<&RuntimeConfig> for RuntimeProfile {
    fn from(config: &RuntimeConfig) -> Self {
        let worker_threads = config
            .worker_threads
            .unwrap_or_else(|| {
                available_parallelism().map(std::num::NonZero::get).unwrap_or(DEFAULT_WORKER_THREADS)
            })
            .clamp(1, 1024);
        let thread_name = if config.thread_name.trim().is_empty() {
            "capstan-worker".to_owned()
        } else {
            config.thread_name.clone()
        };

        Self {
            worker_threads,
            stack_size: config.thread_stack_size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE),
            thread_name,
        }
    }
}

impl RuntimeProfile {
    /// Builds a multi-threaded runtime with all drivers enabled.
    pub fn build(&self) -> Result<Runtime, KernelError> {
        debug!(
            worker_threads = self.worker_threads,
            stack_size = self.stack_size,
            thread_name = %self.thread_name,
            "Building tokio runtime"
        );

        Builder::new_multi_thread()
            .worker_threads(self.worker_threads)
            .thread_stack_size(self.stack_size)
            .thread_name(self.thread_name.clone())
            .thread_keep_alive(THREAD_KEEP_ALIVE)
            .enable_all()
            .build()
            .context("Failed to build tokio runtime")
    }
}
