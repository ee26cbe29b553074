//! Environment variable overrides.
//!
//! `MYAPP__IO__LOG_DIR=out` with prefix `MYAPP` and separator `__` lands at `io.log_dir`.

use toml::{Table, Value};

use super::path::merge_at;

/// Applies every process environment variable starting with `prefix` + `separator`.
pub(crate) fn apply_env_vars(table: &mut Table, prefix: &str, separator: &str) {
    apply_vars(table, prefix, separator, std::env::vars());
}

/// Applies matching `(name, value)` pairs onto `table`.
///
/// An empty separator matches nothing. Variables whose remaining name has an
/// empty segment (`MYAPP____X`) are skipped.
pub(crate) fn apply_vars<I>(table: &mut Table, prefix: &str, separator: &str, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    if separator.is_empty() {
        return;
    }
    let prefix_with_sep = format!("{prefix}{separator}");

    for (key, raw) in vars {
        let Some(rest) = key.strip_prefix(&prefix_with_sep) else {
            continue;
        };
        let path: Vec<String> = rest.split(separator).map(str::to_lowercase).collect();
        if path.iter().any(String::is_empty) {
            continue;
        }
        merge_at(table, &path, coerce_value(&raw));
    }
}

/// Picks the most specific TOML type for an environment string.
fn coerce_value(s: &str) -> Value {
    if s.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }

    let digits = s.strip_prefix('-').unwrap_or(s);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(i) = s.parse::<i64>() {
            return Value::Integer(i);
        }
    }

    if s.contains('.') {
        if let Ok(f) = s.parse::<f64>() {
            return Value::Float(f);
        }
    }

    Value::String(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_nested_override() {
        let mut table = Table::new();
        apply_vars(
            &mut table,
            "APP",
            "__",
            vars(&[("APP__IO__LOG_DIR", "out"), ("OTHER__IO__LOG_DIR", "no")]),
        );
        assert_eq!(table["io"]["log_dir"].as_str(), Some("out"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_coercion() {
        let mut table = Table::new();
        apply_vars(
            &mut table,
            "APP",
            "__",
            vars(&[
                ("APP__A", "TRUE"),
                ("APP__B", "-42"),
                ("APP__C", "0.5"),
                ("APP__D", "1.2.3"),
            ]),
        );
        assert_eq!(table["a"], Value::Boolean(true));
        assert_eq!(table["b"], Value::Integer(-42));
        assert_eq!(table["c"], Value::Float(0.5));
        assert_eq!(table["d"].as_str(), Some("1.2.3"));
    }

    #[test]
    fn test_skips_empty_segments() {
        let mut table = Table::new();
        apply_vars(&mut table, "APP", "__", vars(&[("APP____X", "1"), ("APP__", "2")]));
        assert!(table.is_empty());
    }
}
