//! Configuration loading and key-path access.

mod autosave;
mod builder;
mod env;
mod error;
mod path;
mod store;

pub use builder::Config;
pub use error::ConfigError;
pub use store::ConfigStore;
