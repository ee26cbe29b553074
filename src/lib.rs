pub mod config;
pub mod context;
mod error;
pub mod logging;
pub mod shell;

pub use config::{Config, ConfigError, ConfigStore};
pub use context::AppContext;
pub use error::Error;
pub use logging::{Level, LogRouter, LogSink, Logger};
pub use shell::{ApplicationShell, Hooks, Outcome, ShellOptions, State};
