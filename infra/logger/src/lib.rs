//! # Logger
//!
//! Installs the process-wide `tracing` subscriber for the container.
//!
//! * a compact ANSI console layer,
//! * an optional non-blocking rolling file layer (plain or JSON),
//! * an `EnvFilter` seeded from the configured directives; `RUST_LOG` wins when set.
//!
//! The returned [`Logger`] owns the file writer's worker guard and must live until shutdown.
//!
//! ```rust
//! use capstan_domain::config::LoggingConfig;
//! use capstan_logger::Logger;
//!
//! let _logger = Logger::from_config("capstan", &LoggingConfig::default()).unwrap();
//! tracing::info!("container starting");
//! ```

mod error;

pub use crate::error::LoggerError;
pub use tracing_appender::rolling::Rotation;

use capstan_domain::config::LoggingConfig;
use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

const LOG_FILE_SUFFIX: &str = "log";

/// Collected logger settings.
#[derive(Debug)]
pub struct LoggerBuilder {
    name: String,
    directives: String,
    console: bool,
    directory: Option<PathBuf>,
    json: bool,
    rotation: Rotation,
    max_files: usize,
}

impl LoggerBuilder {
    /// Filter directives, e.g. `info,capstan_services=debug`.
    #[must_use = "The builder must be consumed by `init`"]
    pub fn directives(mut self, directives: impl Into<String>) -> Self {
        self.directives = directives.into();
        self
    }

    #[must_use = "The builder must be consumed by `init`"]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    /// Writes rolling log files into `directory`.
    #[must_use = "The builder must be consumed by `init`"]
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// File output as one JSON object per line.
    #[must_use = "The builder must be consumed by `init`"]
    pub const fn json(mut self, enabled: bool) -> Self {
        self.json = enabled;
        self
    }

    #[must_use = "The builder must be consumed by `init`"]
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    #[must_use = "The builder must be consumed by `init`"]
    pub const fn max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    /// Installs the global subscriber.
    ///
    /// # Errors
    /// * [`LoggerError::InvalidConfiguration`] for an empty name, zero `max_files`, a bad
    ///   filter, or no enabled output.
    /// * [`LoggerError::Subscriber`] if a global subscriber is already installed.
    pub fn init(self) -> Result<Logger, LoggerError> {
        self.validate()?;
        let filter = EnvFilter::builder().parse(&self.directives).map_err(|e| {
            LoggerError::InvalidConfiguration {
                message: format!("Invalid filter '{}': {e}", self.directives).into(),
                context: None,
            }
        })?;
        let filter = EnvFilter::try_from_default_env().unwrap_or(filter);

        let mut layers = Vec::new();
        if self.console {
            layers.push(fmt::layer().compact().with_ansi(true).boxed());
        }

        let guard = match &self.directory {
            Some(directory) => {
                fs::create_dir_all(directory).map_err(|e| LoggerError::Internal {
                    message: e.to_string().into(),
                    context: Some(format!("Failed to create {}", directory.display()).into()),
                })?;
                let appender = RollingFileAppender::builder()
                    .rotation(self.rotation.clone())
                    .filename_prefix(&self.name)
                    .filename_suffix(LOG_FILE_SUFFIX)
                    .max_log_files(self.max_files)
                    .build(directory)?;
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let file = fmt::layer().with_writer(writer).with_ansi(false);
                layers.push(if self.json { file.json().boxed() } else { file.boxed() });
                Some(guard)
            },
            None => None,
        };

        tracing_subscriber::registry().with(filter).with(layers).try_init()?;
        Ok(Logger { guard })
    }

    fn validate(&self) -> Result<(), LoggerError> {
        let problem = if self.name.trim().is_empty() {
            Some("Logger name cannot be empty")
        } else if self.max_files == 0 {
            Some("max_files must be greater than zero")
        } else if !self.console && self.directory.is_none() {
            Some("No output enabled; enable the console or set a log directory")
        } else {
            None
        };
        problem.map_or(Ok(()), |message| {
            Err(LoggerError::InvalidConfiguration { message: message.into(), context: None })
        })
    }
}

/// Handle to the installed subscriber. Dropping it flushes and stops the file writer.
#[must_use = "Dropping this handle stops background file logging."]
#[derive(Debug)]
pub struct Logger {
    guard: Option<WorkerGuard>,
}

impl Logger {
    /// Console-only `info` logging under `name`; file output is opt-in.
    #[must_use = "The builder must be consumed by `init`"]
    pub fn builder(name: impl Into<String>) -> LoggerBuilder {
        LoggerBuilder {
            name: name.into(),
            directives: "info".to_owned(),
            console: true,
            directory: None,
            json: false,
            rotation: Rotation::DAILY,
            max_files: 7,
        }
    }

    /// Builds and installs the subscriber described by `config`. File output is JSON.
    pub fn from_config(name: impl Into<String>, config: &LoggingConfig) -> Result<Self, LoggerError> {
        let mut builder = Self::builder(name)
            .directives(config.level.clone())
            .console(config.console)
            .max_files(config.max_files);
        if let Some(directory) = &config.directory {
            builder = builder.directory(directory).json(true);
        }
        builder.init()
    }

    /// Whether a file writer is attached.
    #[must_use]
    pub const fn writes_files(&self) -> bool {
        self.guard.is_some()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::info!("Logging shutting down, flushing file output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let builder = Logger::builder("capstan");
        assert!(builder.console);
        assert_eq!(builder.directives, "info");
        assert!(builder.directory.is_none());
        assert_eq!(builder.max_files, 7);
    }

    #[test]
    fn validation_rejects_unusable_settings() {
        let no_output = Logger::builder("capstan").console(false).validate();
        assert!(matches!(no_output, Err(LoggerError::InvalidConfiguration { .. })));

        let no_name = Logger::builder(" ").validate();
        assert!(matches!(no_name, Err(LoggerError::InvalidConfiguration { .. })));

        let no_files = Logger::builder("capstan").max_files(0).validate();
        assert!(matches!(no_files, Err(LoggerError::InvalidConfiguration { .. })));
    }

    #[test]
    fn bad_filter_is_reported_before_install() {
        let err = Logger::builder("capstan").directives("capstan=verbose").init().unwrap_err();
        assert!(err.to_string().contains("Invalid filter"));
    }
}
