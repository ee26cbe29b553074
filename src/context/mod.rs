//! What the application's hooks see while the shell drives them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::config::{ConfigError, ConfigStore};
use crate::logging::{LogRouter, Logger};

/// Loaded configuration plus the log router, handed to every hook.
///
/// Built by the shell once configuration succeeds, so a hook never observes a
/// half-initialized context.
///
/// ## Example
///
/// ```no_run
/// use shell_fnd::context::AppContext;
///
/// fn process(ctx: &AppContext, item: &str) {
///     let output_dir: String = ctx.config().get("io.output_dir", "output");
///     let log = ctx.logger_for(item);
///     log.info(format!("writing into {output_dir}"));
/// }
/// ```
#[derive(Debug)]
pub struct AppContext {
    app_name: String,
    config: ConfigStore,
    router: Arc<LogRouter>,
    logger: Logger,
    log_dir: PathBuf,
}

impl AppContext {
    pub(crate) fn new(
        app_name: &str,
        config: ConfigStore,
        router: Arc<LogRouter>,
        log_dir: PathBuf,
    ) -> Self {
        let logger = router.scoped(app_name);
        Self {
            app_name: app_name.to_string(),
            config,
            router,
            logger,
            log_dir,
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Typed view of a config section, e.g. `ctx.settings::<CsvSettings>("csv")`.
    pub fn settings<T: DeserializeOwned>(&self, key_path: &str) -> Result<T, ConfigError> {
        self.config.section(key_path)
    }

    pub fn router(&self) -> &Arc<LogRouter> {
        &self.router
    }

    /// The application's own logger; its records land in `<app>_<date>.log`.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// A logger for one work item, with its own daily log file.
    pub fn logger_for(&self, context: impl Into<String>) -> Logger {
        self.router.scoped(context)
    }

    /// Directory holding the daily log files.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}
