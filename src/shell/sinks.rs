//! Sinks every shell installs from configuration before hooks run.

use std::path::{Path, PathBuf};

use crate::config::ConfigStore;
use crate::logging::{
    ConsoleSink, DailyFileSink, Level, LogRouter, UiBuffer, UiSink, DEFAULT_TIME_FORMAT,
};

use super::ShellError;

/// `[logging]` and `[io]` keys the base setup reads.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StandardLogging {
    pub level: Level,
    pub time_format: String,
    pub log_dir: PathBuf,
    /// Mirror standard output to stderr (`logging.console`).
    pub console: bool,
}

impl StandardLogging {
    pub fn from_config(store: &ConfigStore, base_dir: &Path) -> Self {
        let level = match store.lookup("logging.level") {
            None => Level::Info,
            Some(_) => store.require("logging.level").unwrap_or_else(|e| {
                tracing::warn!(error = %e, "invalid logging.level, using INFO");
                Level::Info
            }),
        };
        let time_format: String = store.get("logging.date_format", DEFAULT_TIME_FORMAT);
        let log_dir: String = store.get("io.log_dir", "log");

        Self {
            level,
            time_format,
            log_dir: base_dir.join(log_dir),
            console: store.get("logging.console", false),
        }
    }
}

pub(crate) fn install(
    router: &LogRouter,
    store: &ConfigStore,
    logging: &StandardLogging,
    ui: Option<&UiBuffer>,
) -> Result<(), ShellError> {
    router.add_sink(
        DailyFileSink::new(&logging.log_dir, logging.level)
            .with_time_format(logging.time_format.as_str()),
    );

    if logging.console {
        router.add_sink(
            ConsoleSink::new(logging.level).with_time_format(logging.time_format.as_str()),
        );
    }

    if let Some(buffer) = ui {
        router.add_sink(
            UiSink::new(buffer.clone(), logging.level)
                .with_time_format(logging.time_format.as_str()),
        );
    }

    if store.contains("alerts.endpoint") && store.get("alerts.enabled", true) {
        install_remote(router, store)?;
    }

    Ok(())
}

#[cfg(feature = "webhook")]
fn install_remote(router: &LogRouter, store: &ConfigStore) -> Result<(), ShellError> {
    use crate::logging::{RemoteSettings, RemoteSink, WebhookTransport};

    let settings: RemoteSettings = store.section("alerts")?;
    tracing::debug!(endpoint = %settings.endpoint, "installing alert sink");
    router.add_sink(RemoteSink::spawn(WebhookTransport::new(), settings)?);
    Ok(())
}

#[cfg(not(feature = "webhook"))]
fn install_remote(_router: &LogRouter, _store: &ConfigStore) -> Result<(), ShellError> {
    tracing::warn!("alerts.endpoint is set but the webhook feature is disabled; no alert sink installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(toml_str: &str) -> ConfigStore {
        ConfigStore::from_table(toml::from_str(toml_str).unwrap())
    }

    #[test]
    fn test_defaults() {
        let logging = StandardLogging::from_config(&ConfigStore::empty(), Path::new("/srv/tool"));
        assert_eq!(logging.level, Level::Info);
        assert_eq!(logging.time_format, DEFAULT_TIME_FORMAT);
        assert_eq!(logging.log_dir, PathBuf::from("/srv/tool/log"));
        assert!(!logging.console);
    }

    #[test]
    fn test_configured_values() {
        let logging = StandardLogging::from_config(
            &store(
                r#"
                [io]
                log_dir = "logs"
                [logging]
                level = "WARNING"
                date_format = "%H:%M:%S"
                "#,
            ),
            Path::new("/srv/tool"),
        );
        assert_eq!(logging.level, Level::Warning);
        assert_eq!(logging.time_format, "%H:%M:%S");
        assert_eq!(logging.log_dir, PathBuf::from("/srv/tool/logs"));
    }

    #[test]
    fn test_invalid_level_falls_back() {
        let logging =
            StandardLogging::from_config(&store("[logging]\nlevel = \"LOUD\"\n"), Path::new("."));
        assert_eq!(logging.level, Level::Info);
    }

    #[test]
    fn test_install_counts() {
        let router = LogRouter::new();
        let logging = StandardLogging::from_config(&ConfigStore::empty(), Path::new("."));
        install(&router, &ConfigStore::empty(), &logging, Some(&UiBuffer::new())).unwrap();
        assert_eq!(router.sink_count(), 2);
    }

    #[test]
    fn test_console_opt_in() {
        let config = store("[logging]\nconsole = true\n");
        let logging = StandardLogging::from_config(&config, Path::new("."));
        assert!(logging.console);

        let router = LogRouter::new();
        install(&router, &config, &logging, None).unwrap();
        assert_eq!(router.sink_count(), 2);
    }
}
