use thiserror::Error;

use super::State;
use crate::config::ConfigError;
use crate::logging::SinkError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ShellError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot {action} while {from}")]
    InvalidTransition { from: State, action: &'static str },

    #[error("configure hook failed: {0:#}")]
    Hook(anyhow::Error),

    #[error("failed to install log sink: {0}")]
    Sink(#[from] SinkError),
}
