//! # Capstan Server
//!
//! Process host for the container: boots the default profile and the configured boot file,
//! logs lifecycle events from the bus, and shuts down cleanly on Ctrl+C or SIGTERM.
//!
//! ## Example
//! ```no_run
//! use capstan_server::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Server::builder().build()?.run().await
//! }
//! ```

use anyhow::{Context, Result};
use capstan::domain::config::KernelConfig;
use capstan::domain::events::{ModelRolledBack, ProcessStateChanged, ServiceTransition};
use capstan::domain::{CompositeRequest, ServiceState};
use capstan::{Container, default_profile, load_boot_file};
use capstan_event_bus::{EventBus, EventStream};
use std::future::Future;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A fluent builder for configuring and initializing the [`Server`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug, Default)]
pub struct ServerBuilder {
    cfg: KernelConfig,
}

impl ServerBuilder {
    /// Set up the server's configuration.
    pub fn config(mut self, cfg: KernelConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Consumes the builder and assembles the container with every compiled-in subsystem.
    ///
    /// # Errors
    /// Returns an error if two subsystems claim the same name.
    pub fn build(self) -> Result<Server> {
        info!(container = %self.cfg.container.name, "Initializing server");
        let container = Container::builder()
            .config(self.cfg)
            .default_extensions()
            .build()
            .context("Failed to assemble container")?;
        Ok(Server { container })
    }
}

/// A container ready to boot.
#[must_use = "call .run().await to start the server"]
#[derive(Debug)]
pub struct Server {
    container: Container,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Boots the container and runs until the shutdown signal is received.
    ///
    /// # Errors
    /// Returns an error if the boot file cannot be read or the boot fails.
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = shutdown_signal().await {
                error!("Error while waiting for shutdown signal: {e:#}");
            }
        })
        .await
    }

    /// Boots the container, waits for `shutdown`, then stops every service.
    ///
    /// # Errors
    /// Returns an error if the boot file cannot be read or the boot fails. Services that
    /// did start are stopped before returning.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let observer = observe(self.container.events());

        let booted = self.boot().await;
        if booted.is_ok() {
            shutdown.await;
            info!("Shutdown signal received, stopping services...");
        }
        self.container.shutdown().await;
        observer.abort();

        booted.inspect(|()| info!("Server shutdown complete"))
    }

    async fn boot(&self) -> Result<()> {
        let requests = boot_requests(self.container.config()).await?;
        let report = self.container.boot(requests).await.context("Container boot failed")?;
        info!(
            container = %self.container.config().container.name,
            services = report.up.len(),
            "Container running"
        );
        Ok(())
    }

    #[must_use]
    pub const fn container(&self) -> &Container {
        &self.container
    }
}

/// Default profile first (unless skipped), then the boot file's requests in file order.
pub async fn boot_requests(cfg: &KernelConfig) -> Result<Vec<CompositeRequest>> {
    let mut requests = Vec::new();
    if !cfg.container.skip_default_profile {
        requests.push(default_profile());
    }
    if let Some(path) = &cfg.container.boot_file {
        requests.extend(load_boot_file(path).await.context("Failed to load boot file")?);
    }
    Ok(requests)
}

/// Logs lifecycle events until the bus closes or the task is aborted.
fn observe(events: &EventBus) -> JoinHandle<()> {
    let mut transitions = events.subscribe::<ServiceTransition>();
    let mut states = events.subscribe::<ProcessStateChanged>();
    let mut rollbacks = events.subscribe::<ModelRolledBack>();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(t) = transitions.next_event() => match t.to {
                    ServiceState::Failed => warn!(service = %t.service, from = %t.from, "Service failed"),
                    _ => debug!(service = %t.service, from = %t.from, to = %t.to, "Service transition"),
                },
                Some(s) = states.next_event() => {
                    info!(from = %s.from, to = %s.to, "Process state changed");
                },
                Some(r) = rollbacks.next_event() => {
                    warn!(
                        request = %r.request_id,
                        step = r.step,
                        clean = r.clean,
                        reason = %r.reason,
                        "Request rolled back"
                    );
                },
                else => break,
            }
        }
    })
}

/// Listens for shutdown signals (Ctrl+C, SIGTERM).
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => res?,
        res = terminate => res?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstan::domain::ProcessState;
    use capstan::features::elytron;
    use tempfile::TempDir;

    fn config(boot_file: Option<std::path::PathBuf>, skip_default_profile: bool) -> KernelConfig {
        let mut cfg = KernelConfig::default();
        cfg.container.boot_file = boot_file;
        cfg.container.skip_default_profile = skip_default_profile;
        cfg
    }

    #[tokio::test]
    async fn boot_requests_put_the_default_profile_first() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("boot.json");
        let extra = vec![CompositeRequest::from(elytron::add_properties_realm("r", "users", None, true))];
        std::fs::write(&path, serde_json::to_string(&extra).unwrap()).unwrap();

        let requests = boot_requests(&config(Some(path.clone()), false)).await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].id.as_deref(), Some(capstan::DEFAULT_PROFILE_ID));
        assert_eq!(requests[1], extra[0]);

        let requests = boot_requests(&config(Some(path), true)).await.unwrap();
        assert_eq!(requests, extra);
    }

    #[tokio::test]
    async fn missing_boot_file_is_an_error() {
        let dir = TempDir::new().unwrap();

        assert!(boot_requests(&config(Some(dir.path().join("absent.json")), false)).await.is_err());
    }

    #[tokio::test]
    async fn run_until_boots_then_stops() {
        let server = Server::builder().build().unwrap();

        server.run_until(async {}).await.unwrap();

        assert_eq!(server.container().process_state(), ProcessState::Stopping);
        assert!(!server.container().registry().services().is_empty());
        assert!(server.container().registry().services().iter().all(|s| s.state == ServiceState::Defined));
    }
}
