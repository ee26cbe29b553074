use crate::config::ConfigError;
use crate::shell::ShellError;
use thiserror::Error;

/// Top-level error type for the shell-fnd library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Shell(#[from] ShellError),
}
