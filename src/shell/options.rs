use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::logging::{LogRouter, UiBuffer};

/// Everything the shell needs before any I/O happens.
#[derive(Debug, Clone)]
#[must_use]
pub struct ShellOptions {
    pub(super) app_name: String,
    pub(super) config: Config,
    pub(super) required: Vec<String>,
    pub(super) base_dir: PathBuf,
    pub(super) ui: Option<UiBuffer>,
    pub(super) router: Option<Arc<LogRouter>>,
}

impl ShellOptions {
    /// `app_name` doubles as the source name of the shell's own log records.
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            config: Config::builder(),
            required: Vec::new(),
            base_dir: PathBuf::from("."),
            ui: None,
            router: None,
        }
    }

    /// Sources loaded during `configure`. Nothing is read until then.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Key-paths that must be present for `configure` to succeed, checked in order.
    pub fn require<I, S>(mut self, key_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(key_paths.into_iter().map(Into::into));
        self
    }

    /// Directory that a relative `io.log_dir` is resolved against. Defaults to `.`.
    pub fn with_base_dir(mut self, base_dir: impl AsRef<Path>) -> Self {
        self.base_dir = base_dir.as_ref().to_path_buf();
        self
    }

    /// Mirrors standard log output into `buffer` for a UI log pane.
    pub fn with_ui(mut self, buffer: UiBuffer) -> Self {
        self.ui = Some(buffer);
        self
    }

    /// Uses a caller-owned router instead of a fresh one.
    pub fn with_router(mut self, router: Arc<LogRouter>) -> Self {
        self.router = Some(router);
        self
    }
}
