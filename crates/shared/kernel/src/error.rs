use std::borrow::Cow;

/// Errors raised while loading configuration or preparing the runtime.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },

    #[error("Runtime error{}: {source}", format_context(.context))]
    Runtime { source: std::io::Error, context: Option<Cow<'static, str>> },
}

/// Attaches a human-readable context to a failing kernel call.
pub trait KernelErrorExt<T> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, KernelError>;
}

impl<T> KernelErrorExt<T> for Result<T, config::ConfigError> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, KernelError> {
        self.map_err(|source| KernelError::Config { source, context: Some(context.into()) })
    }
}

impl<T> KernelErrorExt<T> for Result<T, std::io::Error> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, KernelError> {
        self.map_err(|source| KernelError::Runtime { source, context: Some(context.into()) })
    }
}

impl From<config::ConfigError> for KernelError {
    fn from(source: config::ConfigError) -> Self {
        Self::Config { source, context: None }
    }
}

pub(crate) fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}
