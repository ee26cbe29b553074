use std::io::Write;

use super::record::DEFAULT_TIME_FORMAT;
use super::{Level, LogRecord, LogSink, SinkError};

/// Writes rendered records to stderr. The router's default fallback.
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    min_level: Level,
    time_format: String,
}

impl ConsoleSink {
    pub fn new(min_level: Level) -> Self {
        Self {
            min_level,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }

    pub fn with_time_format(mut self, time_format: impl Into<String>) -> Self {
        self.time_format = time_format.into();
        self
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(Level::Debug)
    }
}

impl LogSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    fn emit(&mut self, record: &LogRecord) -> Result<(), SinkError> {
        let line = record.render(&self.time_format);
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "{line}").map_err(|e| SinkError::io("stderr", e))
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        std::io::stderr()
            .flush()
            .map_err(|e| SinkError::io("stderr", e))
    }
}
