use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use toml::Table;

use super::env::apply_env_vars;
use super::path::deep_merge;
use super::{ConfigError, ConfigStore};

/// A configuration source in the loading pipeline.
#[derive(Debug, Clone)]
pub(crate) enum ConfigSource {
    Defaults(Table),
    File { path: PathBuf, required: bool },
    Env { prefix: String, separator: String },
}

/// Builder for loading a [`ConfigStore`] from defaults, TOML files and the environment.
///
/// Sources are merged in registration order, with later sources overriding
/// earlier ones. Nested tables are merged recursively; other values
/// (including arrays) are replaced entirely.
///
/// ## Example
///
/// ```no_run
/// use shell_fnd::Config;
///
/// let store = Config::builder()
///     .with_file("config.toml", true)
///     .with_file("config.local.toml", false)
///     .with_env("MYTOOL", "__")
///     .build()?;
///
/// let log_dir: String = store.get("io.log_dir", "log");
/// # Ok::<(), shell_fnd::ConfigError>(())
/// ```
#[derive(Debug, Default, Clone)]
#[must_use = "builders do nothing until .build() is called"]
pub struct Config {
    sources: Vec<ConfigSource>,
    autosave: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Adds a base table, typically the application's built-in defaults.
    pub fn with_defaults(mut self, defaults: Table) -> Self {
        self.sources.push(ConfigSource::Defaults(defaults));
        self
    }

    /// Adds a TOML file to be loaded.
    ///
    /// If `required` is `true`, the build will fail if the file doesn't exist.
    /// Optional files that are missing are silently skipped.
    pub fn with_file(mut self, path: impl AsRef<Path>, required: bool) -> Self {
        self.sources.push(ConfigSource::File {
            path: path.as_ref().to_path_buf(),
            required,
        });
        self
    }

    /// Loads overrides from environment variables named `{prefix}{separator}SEGMENT...`.
    ///
    /// Segments are lowercased and values coerced to boolean, integer, float
    /// or string, in that order of preference.
    pub fn with_env(mut self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Env {
            prefix: prefix.into(),
            separator: separator.into(),
        });
        self
    }

    /// Opts the resulting store into [`ConfigStore::set`], persisting edits to `path`.
    pub fn with_autosave(mut self, path: impl AsRef<Path>) -> Self {
        self.autosave = Some(path.as_ref().to_path_buf());
        self
    }

    /// Loads and merges every source into a [`ConfigStore`].
    pub fn build(self) -> Result<ConfigStore, ConfigError> {
        let table = load_sources(&self.sources)?;
        Ok(ConfigStore::from_parts(table, self.sources, self.autosave))
    }

    /// Loads, merges and deserializes straight into `T`.
    pub fn build_as<T: DeserializeOwned>(self) -> Result<T, ConfigError> {
        let table = load_sources(&self.sources)?;
        toml::Value::Table(table)
            .try_into()
            .map_err(ConfigError::DeserializeError)
    }
}

pub(crate) fn load_sources(sources: &[ConfigSource]) -> Result<Table, ConfigError> {
    let mut merged = Table::new();

    for source in sources {
        match source {
            ConfigSource::Defaults(table) => deep_merge(&mut merged, table.clone()),
            ConfigSource::File { path, required } => {
                if let Some(table) = load_config_file(path, *required)? {
                    deep_merge(&mut merged, table);
                }
            }
            ConfigSource::Env { prefix, separator } => {
                apply_env_vars(&mut merged, prefix, separator);
            }
        }
    }

    Ok(merged)
}

/// Loads and parses a TOML config file.
///
/// Returns `Ok(None)` if the file doesn't exist and `required` is false.
fn load_config_file(path: &Path, required: bool) -> Result<Option<Table>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let table = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(Some(table))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if required {
                Err(ConfigError::FileNotFound(path.to_path_buf()))
            } else {
                Ok(None)
            }
        }
        Err(e) => Err(ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
