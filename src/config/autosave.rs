//! Opt-in persistence of configuration edits.
//!
//! Writes go to a temporary file next to the destination which then atomically
//! replaces it, so a failed save never leaves a half-written config behind.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use toml::{Table, Value};

use super::path::{merge_at, segments};
use super::{ConfigError, ConfigStore};

impl ConfigStore {
    /// Sets `key_path` to `value` and persists the whole store.
    ///
    /// Intermediate tables are created as needed. The in-memory store only
    /// changes once the file has been replaced. Returns
    /// [`ConfigError::ReadOnly`] unless the store was built with
    /// [`with_autosave`](super::Config::with_autosave).
    pub fn set(&mut self, key_path: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        let Some(target) = self.autosave.clone() else {
            return Err(ConfigError::ReadOnly);
        };
        let path = segments(key_path)?;

        let mut updated = self.table.clone();
        // replace rather than merge when the leaf is a table
        if let Some((leaf, parents)) = path.split_last() {
            merge_at(&mut updated, parents, Value::Table(Table::new()));
            if let Some(parent) = lookup_table_mut(&mut updated, parents) {
                parent.insert((*leaf).to_string(), value.into());
            }
        }

        write_atomic(&target, &updated)?;
        self.table = updated;
        Ok(())
    }

    /// Persists the current table to the autosave destination.
    pub fn save(&self) -> Result<(), ConfigError> {
        let target = self.autosave.as_deref().ok_or(ConfigError::ReadOnly)?;
        write_atomic(target, &self.table)
    }
}

fn lookup_table_mut<'a>(table: &'a mut Table, path: &[&str]) -> Option<&'a mut Table> {
    let mut current = table;
    for part in path {
        current = current.get_mut(*part)?.as_table_mut()?;
    }
    Some(current)
}

fn write_atomic(path: &Path, table: &Table) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(table)?;
    let write_error = |source| ConfigError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_error)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_error)?;
    tmp.write_all(contents.as_bytes()).map_err(write_error)?;
    tmp.as_file().sync_all().map_err(write_error)?;
    tmp.persist(path).map_err(|e| write_error(e.error))?;

    tracing::debug!(path = %path.display(), "config saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::{Config, ConfigError};

    #[test]
    fn test_set_requires_opt_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[io]\nlog_dir = \"a\"\n").unwrap();

        let mut store = Config::builder().with_file(&path, true).build().unwrap();
        assert!(matches!(
            store.set("io.log_dir", "b"),
            Err(ConfigError::ReadOnly)
        ));
        let log_dir: String = store.get("io.log_dir", "");
        assert_eq!(log_dir, "a");
    }

    #[test]
    fn test_set_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[io]\nlog_dir = \"a\"\n").unwrap();

        let mut store = Config::builder()
            .with_file(&path, true)
            .with_autosave(&path)
            .build()
            .unwrap();
        store.set("io.log_dir", "b").unwrap();
        store.set("alerts.smtp.port", 587).unwrap();

        let log_dir: String = store.get("io.log_dir", "");
        assert_eq!(log_dir, "b");

        let reloaded = store.reload().unwrap();
        let log_dir: String = reloaded.get("io.log_dir", "");
        let port: i64 = reloaded.get("alerts.smtp.port", 0);
        assert_eq!(log_dir, "b");
        assert_eq!(port, 587);

        // only the target file remains in the directory
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_failed_write_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("config.toml");
        std::fs::write(&source, "[io]\nlog_dir = \"a\"\n").unwrap();
        let before = std::fs::read(&source).unwrap();

        // the destination's parent is a regular file, so it cannot be created
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let mut store = Config::builder()
            .with_file(&source, true)
            .with_autosave(blocker.join("config.toml"))
            .build()
            .unwrap();

        let err = store.set("io.log_dir", "b").unwrap_err();
        assert!(matches!(err, ConfigError::WriteError { .. }));

        let log_dir: String = store.get("io.log_dir", "");
        assert_eq!(log_dir, "a");
        assert_eq!(std::fs::read(&source).unwrap(), before);
        assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "not a directory");
    }

    #[test]
    fn test_set_replaces_scalar_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut store = Config::builder()
            .with_file(&path, false)
            .with_autosave(&path)
            .build()
            .unwrap();
        store.set("io", 1).unwrap();
        store.set("io.log_dir", "x").unwrap();

        let log_dir: String = store.get("io.log_dir", "");
        assert_eq!(log_dir, "x");
    }
}
