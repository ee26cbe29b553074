//! Dotted key-path addressing into nested TOML tables.

use toml::{Table, Value};

use super::ConfigError;

/// Splits a dotted key-path into its segments.
///
/// Empty paths and empty segments (`"io..dir"`, `".io"`) are rejected.
pub(crate) fn segments(key_path: &str) -> Result<Vec<&str>, ConfigError> {
    let parts: Vec<&str> = key_path.split('.').collect();
    if key_path.is_empty() || parts.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::InvalidKeyPath(key_path.to_string()));
    }
    Ok(parts)
}

/// Walks `root` along `key_path`. Any missing or non-table intermediate level yields `None`.
pub(crate) fn lookup<'a>(root: &'a Table, key_path: &str) -> Option<&'a Value> {
    let parts = segments(key_path).ok()?;
    let (first, rest) = parts.split_first()?;

    let mut current = root.get(*first)?;
    for part in rest {
        current = current.as_table()?.get(*part)?;
    }
    Some(current)
}

/// Places `value` at `path`, creating (or replacing non-table) intermediate levels.
///
/// When both the existing value and `value` are tables they are merged recursively.
pub(crate) fn merge_at<S: AsRef<str>>(table: &mut Table, path: &[S], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        if let Value::Table(overlay) = value {
            deep_merge(table, overlay);
        }
        return;
    };
    let first = first.as_ref();

    if rest.is_empty() {
        match (table.get_mut(first), value) {
            (Some(Value::Table(base)), Value::Table(overlay)) => deep_merge(base, overlay),
            (_, value) => {
                table.insert(first.to_string(), value);
            }
        }
        return;
    }

    if !matches!(table.get(first), Some(Value::Table(_))) {
        table.insert(first.to_string(), Value::Table(Table::new()));
    }
    if let Some(Value::Table(nested)) = table.get_mut(first) {
        merge_at(nested, rest, value);
    }
}

/// Merges `overlay` into `base`. Tables merge recursively; everything else is replaced.
pub(crate) fn deep_merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(base_table)), Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_table(toml_str: &str) -> Table {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_lookup_nested() {
        let table = make_table(
            r#"
            [io]
            log_dir = "logs"
            "#,
        );
        assert_eq!(
            lookup(&table, "io.log_dir").and_then(Value::as_str),
            Some("logs")
        );
    }

    #[test]
    fn test_lookup_missing_intermediate() {
        let table = make_table("name = \"x\"");
        assert!(lookup(&table, "io.log_dir").is_none());
        // a scalar in the middle of the path is not a table
        assert!(lookup(&table, "name.inner").is_none());
    }

    #[test]
    fn test_segments_rejects_empty_parts() {
        assert!(matches!(
            segments("io..dir"),
            Err(ConfigError::InvalidKeyPath(_))
        ));
        assert!(segments("").is_err());
        assert_eq!(segments("a.b").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_merge_at_creates_levels() {
        let mut table = make_table("io = 3");
        merge_at(&mut table, &["io", "log_dir"], Value::String("x".into()));
        assert_eq!(table["io"]["log_dir"].as_str(), Some("x"));
    }

    #[test]
    fn test_deep_merge_replaces_arrays() {
        let mut base = make_table(
            r#"
            [io]
            exclude = ["a", "b"]
            encoding = "utf-8"
            "#,
        );
        let overlay = make_table(
            r#"
            [io]
            exclude = ["c"]
            "#,
        );
        deep_merge(&mut base, overlay);
        assert_eq!(base["io"]["exclude"].as_array().unwrap().len(), 1);
        assert_eq!(base["io"]["encoding"].as_str(), Some("utf-8"));
    }
}
