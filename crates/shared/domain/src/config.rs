use serde::Deserialize;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Top-level container configuration.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KernelConfigInner {
    pub container: ContainerConfig,
    pub activation: ActivationConfig,
    pub logging: LoggingConfig,
    pub runtime: RuntimeConfig,
}

/// Thin Arc-wrapped config for inexpensive cloning into subsystems.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct KernelConfig {
    #[serde(flatten, default)]
    inner: Arc<KernelConfigInner>,
}

impl Deref for KernelConfig {
    type Target = KernelConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for KernelConfig {
    fn deref_mut(&mut self) -> &mut KernelConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// Identity and boot inputs of the container.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub name: String,
    /// JSON file holding a list of composite requests applied after the default profile.
    pub boot_file: Option<PathBuf>,
    /// Skip the built-in default profile (subsystems, default executor, connectors).
    pub skip_default_profile: bool,
}

/// Service activation knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// How long boot waits for services to settle before reporting them as timed out.
    pub boot_timeout_secs: u64,
    /// Upper bound for a single service stop during shutdown.
    pub stop_timeout_secs: u64,
}

impl ActivationConfig {
    #[must_use]
    pub const fn boot_timeout(&self) -> Duration {
        Duration::from_secs(self.boot_timeout_secs)
    }

    #[must_use]
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub console: bool,
    /// Enables JSON file logging into this directory.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
    pub max_files: usize,
}

/// Tokio runtime profile for the server binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Defaults to the number of CPU cores.
    pub worker_threads: Option<usize>,
    pub thread_name: String,
    pub thread_stack_size: usize,
}

// --- Default ---

impl Default for ContainerConfig {
    fn default() -> Self {
        Self { name: "capstan".to_owned(), boot_file: None, skip_default_profile: false }
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self { boot_timeout_secs: 300, stop_timeout_secs: 30 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            console: true,
            directory: None,
            file_prefix: "capstan".to_owned(),
            max_files: 7,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { worker_threads: None, thread_name: "capstan-worker".to_owned(), thread_stack_size: 2 * 1024 * 1024 }
    }
}
