//! Loaded configuration with key-path access.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use toml::{Table, Value};

use super::builder::{load_sources, ConfigSource};
use super::path;
use super::ConfigError;

/// Configuration loaded once per run and addressed by dotted key-paths.
///
/// Reads never mutate the store. The only write path is [`set`](Self::set),
/// available when the builder opted in with
/// [`with_autosave`](super::Config::with_autosave).
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    pub(super) table: Table,
    sources: Vec<ConfigSource>,
    pub(super) autosave: Option<PathBuf>,
}

impl ConfigStore {
    pub(super) fn from_parts(
        table: Table,
        sources: Vec<ConfigSource>,
        autosave: Option<PathBuf>,
    ) -> Self {
        Self {
            table,
            sources,
            autosave,
        }
    }

    /// A store with no keys.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wraps an already parsed table. [`reload`](Self::reload) on such a store is a no-op copy.
    pub fn from_table(table: Table) -> Self {
        Self::from_parts(table.clone(), vec![ConfigSource::Defaults(table)], None)
    }

    /// Returns the raw value at `key_path`, if present.
    pub fn lookup(&self, key_path: &str) -> Option<&Value> {
        path::lookup(&self.table, key_path)
    }

    pub fn contains(&self, key_path: &str) -> bool {
        self.lookup(key_path).is_some()
    }

    /// Returns the value at `key_path` decoded as `T`, or `default`.
    ///
    /// Never fails: a missing level, a missing leaf, or a value that does not
    /// decode as `T` all yield `default`.
    pub fn get<T: DeserializeOwned>(&self, key_path: &str, default: impl Into<T>) -> T {
        match self.lookup(key_path) {
            Some(value) => match value.clone().try_into() {
                Ok(decoded) => decoded,
                Err(e) => {
                    tracing::debug!(key = key_path, error = %e, "config value ignored, using default");
                    default.into()
                }
            },
            None => default.into(),
        }
    }

    /// Like [`get`](Self::get) but absence is [`ConfigError::MissingKey`] and a
    /// mismatched type is [`ConfigError::InvalidValue`].
    pub fn require<T: DeserializeOwned>(&self, key_path: &str) -> Result<T, ConfigError> {
        let value = self
            .lookup(key_path)
            .ok_or_else(|| ConfigError::MissingKey(key_path.to_string()))?;
        value
            .clone()
            .try_into()
            .map_err(|source| ConfigError::InvalidValue {
                key: key_path.to_string(),
                source,
            })
    }

    /// Deserializes the table at `key_path` into `T`.
    pub fn section<T: DeserializeOwned>(&self, key_path: &str) -> Result<T, ConfigError> {
        self.require(key_path)
    }

    /// Deserializes the whole store into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        Value::Table(self.table.clone())
            .try_into()
            .map_err(ConfigError::DeserializeError)
    }

    /// Checks that every key-path is present, in declared order.
    ///
    /// Fails with [`ConfigError::MissingKey`] naming the first absent path.
    /// Value types are not checked.
    pub fn validate<I, S>(&self, required: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key_path in required {
            let key_path = key_path.as_ref();
            if !self.contains(key_path) {
                return Err(ConfigError::MissingKey(key_path.to_string()));
            }
        }
        Ok(())
    }

    /// The full merged table.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Re-reads every recorded source into a fresh store.
    pub fn reload(&self) -> Result<ConfigStore, ConfigError> {
        let table = load_sources(&self.sources)?;
        Ok(Self::from_parts(
            table,
            self.sources.clone(),
            self.autosave.clone(),
        ))
    }
}
