use std::fmt::Write;

use chrono::{DateTime, Local};

use super::Level;

/// Timestamp format used when none is configured.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One log event. Sinks persist only its rendered text.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    timestamp: DateTime<Local>,
    level: Level,
    source: String,
    message: String,
}

impl LogRecord {
    /// Creates a record stamped with the current local time.
    pub fn new(level: Level, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::at(Local::now(), level, source, message)
    }

    pub fn at(
        timestamp: DateTime<Local>,
        level: Level,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level,
            source: source.into(),
            message: message.into(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Renders `<timestamp> [<LEVEL>]: <message>`.
    ///
    /// A `time_format` chrono cannot render falls back to [`DEFAULT_TIME_FORMAT`].
    pub fn render(&self, time_format: &str) -> String {
        let mut stamp = String::new();
        if write!(stamp, "{}", self.timestamp.format(time_format)).is_err() {
            stamp.clear();
            let _ = write!(stamp, "{}", self.timestamp.format(DEFAULT_TIME_FORMAT));
        }
        format!("{stamp} [{}]: {}", self.level, self.message)
    }
}
