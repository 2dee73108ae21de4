use crate::error::{KernelError, KernelErrorExt};
use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::info;

/// Prefix for environment overrides, e.g. `CAPSTAN__CONTAINER__NAME`.
pub const ENV_PREFIX: &str = "CAPSTAN";

/// Layered configuration loader.
///
/// 1. **File**: when `path` is given, the file is required and its format is taken from the
///    extension (`capstan.toml`, `capstan.json`, ...).
/// 2. **Environment**: variables prefixed with `CAPSTAN__` override file values. Nested keys use
///    double underscores (`CAPSTAN__LOGGING__LEVEL` maps to `logging.level`).
///
/// Missing keys fall back to the target type's `#[serde(default)]` values, so calling this with
/// `None` and no environment yields the defaults.
///
/// # Errors
/// Fails when the file is missing or unreadable, or the merged values do not match `T`.
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, KernelError>
where
    T: DeserializeOwned,
{
    let mut builder = Config::builder();
    if let Some(path) = path.as_ref() {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading config");
        builder = builder.add_source(File::from(path).required(true));
    }

    builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .convert_case(config::Case::Snake),
        )
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")
}
