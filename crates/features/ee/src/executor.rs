use crate::context::ContextService;
use crate::error::ExecutorError;
use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use strum_macros::{Display, EnumString};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What happens to a task submitted while the executor is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectPolicy {
    Abort,
    /// Yield once and try again before giving up.
    RetryAbort,
}

/// Sizing and behavior of a managed executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub core_threads: usize,
    /// Tasks running at the same time.
    pub max_threads: usize,
    pub keepalive: Duration,
    /// Tasks allowed to wait for a free slot. Zero means unbounded.
    pub queue_length: usize,
    /// Tasks running longer than this are reported. `None` disables the check.
    pub hung_task_threshold: Option<Duration>,
    pub long_running_tasks: bool,
    pub reject_policy: RejectPolicy,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            core_threads: 5,
            max_threads: 25,
            keepalive: Duration::from_secs(60),
            queue_length: 0,
            hung_task_threshold: None,
            long_running_tasks: false,
            reject_policy: RejectPolicy::Abort,
        }
    }
}

/// Bounded task executor published by a `managed-executor-service` resource.
///
/// At most `max_threads` tasks run at once; up to `queue_length` more wait for a slot.
/// Submissions beyond that are handled according to the [`RejectPolicy`].
pub struct ManagedExecutor {
    name: String,
    jndi_name: String,
    context: Option<Arc<ContextService>>,
    settings: ExecutorSettings,
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
}

impl Debug for ManagedExecutor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedExecutor")
            .field("name", &self.name)
            .field("jndi_name", &self.jndi_name)
            .field("in_flight", &self.in_flight())
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

/// Releases an in-flight slot when the task finishes or is dropped.
struct Slot(Arc<AtomicUsize>);

impl Drop for Slot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ManagedExecutor {
    pub fn new(
        name: impl Into<String>,
        jndi_name: impl Into<String>,
        context: Option<Arc<ContextService>>,
        settings: ExecutorSettings,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_threads.max(1)));
        Self {
            name: name.into(),
            jndi_name: jndi_name.into(),
            context,
            settings,
            permits,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn jndi_name(&self) -> &str {
        &self.jndi_name
    }

    /// Context service tasks are propagated through, if one is configured.
    #[must_use]
    pub fn context(&self) -> Option<&ContextService> {
        self.context.as_deref()
    }

    #[must_use]
    pub const fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Running plus queued tasks.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Running plus queued tasks the executor accepts; `None` when the queue is unbounded.
    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        if self.settings.queue_length == 0 {
            None
        } else {
            Some(self.settings.max_threads + self.settings.queue_length)
        }
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.permits.is_closed()
    }

    /// Queues `task`. The handle yields `None` if the executor shut down before the task ran.
    pub async fn submit<F>(&self, task: F) -> Result<JoinHandle<Option<F::Output>>, ExecutorError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let slot = match self.reserve() {
            Ok(slot) => slot,
            Err(ExecutorError::Rejected { .. }) if self.settings.reject_policy == RejectPolicy::RetryAbort => {
                tokio::task::yield_now().await;
                self.reserve()?
            },
            Err(e) => return Err(e),
        };
        Ok(self.spawn(slot, task))
    }

    /// Stops accepting tasks. Queued tasks are dropped; running ones finish.
    pub fn shutdown(&self) {
        if !self.permits.is_closed() {
            self.permits.close();
            info!(executor = %self.name, in_flight = self.in_flight(), "Managed executor shut down");
        }
    }

    fn reserve(&self) -> Result<Slot, ExecutorError> {
        if self.is_shutdown() {
            return Err(ExecutorError::Shutdown { executor: self.name.clone() });
        }
        let capacity = self.capacity();
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                capacity.is_none_or(|c| n < c).then_some(n + 1)
            })
            .map(|_| Slot(self.in_flight.clone()))
            .map_err(|in_flight| {
                debug!(executor = %self.name, in_flight, "Task rejected");
                ExecutorError::Rejected {
                    executor: self.name.clone(),
                    in_flight,
                    capacity: capacity.unwrap_or(usize::MAX),
                }
            })
    }

    fn spawn<F>(&self, slot: Slot, task: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = self.permits.clone();
        let executor = self.name.clone();
        let threshold = self.settings.hung_task_threshold;
        tokio::spawn(async move {
            let _slot = slot;
            let Ok(_permit) = permits.acquire_owned().await else {
                return None;
            };
            let started = Instant::now();
            let output = task.await;
            let elapsed = started.elapsed();
            if let Some(threshold) = threshold
                && elapsed > threshold
            {
                warn!(%executor, elapsed_ms = elapsed.as_millis(), "Task exceeded the hung task threshold");
            }
            Some(output)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    fn executor(max_threads: usize, queue_length: usize, reject_policy: RejectPolicy) -> ManagedExecutor {
        ManagedExecutor::new(
            "default",
            "java:jboss/ee/concurrency/executor/default",
            None,
            ExecutorSettings { max_threads, queue_length, reject_policy, ..ExecutorSettings::default() },
        )
    }

    #[tokio::test]
    async fn tasks_beyond_capacity_are_rejected() {
        let executor = executor(1, 1, RejectPolicy::Abort);
        let gate = Arc::new(Notify::new());

        let running = {
            let gate = gate.clone();
            executor.submit(async move { gate.notified().await; 1 }).await.unwrap()
        };
        let queued = executor.submit(async { 2 }).await.unwrap();
        let err = executor.submit(async { 3 }).await.unwrap_err();

        assert_eq!(err, ExecutorError::Rejected { executor: "default".into(), in_flight: 2, capacity: 2 });
        gate.notify_one();
        assert_eq!(running.await.unwrap(), Some(1));
        assert_eq!(queued.await.unwrap(), Some(2));
        assert_eq!(executor.in_flight(), 0);
    }

    #[tokio::test]
    async fn retry_abort_takes_a_slot_freed_while_yielding() {
        let executor = executor(1, 1, RejectPolicy::RetryAbort);
        let gate = Arc::new(Notify::new());

        let quick = executor.submit(async { 1 }).await.unwrap();
        let held = {
            let gate = gate.clone();
            executor.submit(async move { gate.notified().await; 2 }).await.unwrap()
        };
        assert_eq!(executor.in_flight(), 2);

        // Full at first; `quick` finishes during the yield and frees its slot.
        let retried = executor.submit(async { 3 }).await.unwrap();

        assert_eq!(quick.await.unwrap(), Some(1));
        gate.notify_one();
        assert_eq!(held.await.unwrap(), Some(2));
        assert_eq!(retried.await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn retry_abort_gives_up_when_nothing_frees() {
        let executor = executor(1, 1, RejectPolicy::RetryAbort);
        let gate = Arc::new(Notify::new());
        let mut held = Vec::new();
        for n in 0..2 {
            let gate = gate.clone();
            held.push(executor.submit(async move { gate.notified().await; n }).await.unwrap());
        }

        let err = executor.submit(async { 2 }).await.unwrap_err();

        assert_eq!(err, ExecutorError::Rejected { executor: "default".into(), in_flight: 2, capacity: 2 });
        gate.notify_waiters();
        gate.notify_one();
        for handle in held {
            assert!(handle.await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn shutdown_drops_queued_tasks() {
        let executor = executor(1, 0, RejectPolicy::Abort);
        let gate = Arc::new(Notify::new());
        let running = {
            let gate = gate.clone();
            executor.submit(async move { gate.notified().await; "ran" }).await.unwrap()
        };
        tokio::task::yield_now().await;
        let queued = executor.submit(async { "queued" }).await.unwrap();

        executor.shutdown();
        gate.notify_one();

        assert_eq!(running.await.unwrap(), Some("ran"));
        assert_eq!(queued.await.unwrap(), None);
        assert_eq!(
            executor.submit(async {}).await.unwrap_err(),
            ExecutorError::Shutdown { executor: "default".into() }
        );
        assert_eq!(executor.capacity(), None);
    }
}
