use thiserror::Error;

use super::{Level, LogRecord};

/// Failure inside a single sink. The router catches these; they never reach callers of `log`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    #[error("I/O error on {target}: {source}")]
    Io {
        target: String,
        source: std::io::Error,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("delivery timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("delivery queue is full, record dropped")]
    QueueFull,

    #[error("sink is closed")]
    Closed,

    #[error("delivery rejected: {0}")]
    Rejected(String),

    #[error("sink panicked: {0}")]
    Panicked(String),
}

impl SinkError {
    pub(crate) fn io(target: impl Into<String>, source: std::io::Error) -> Self {
        SinkError::Io {
            target: target.into(),
            source,
        }
    }
}

/// A destination for log records.
///
/// Each sink is owned by one router slot behind its own lock, so `emit` never
/// runs concurrently for the same sink.
pub trait LogSink: Send {
    /// Short name used when reporting this sink's failures.
    fn name(&self) -> &str;

    fn min_level(&self) -> Level;

    fn accepts(&self, level: Level) -> bool {
        level >= self.min_level()
    }

    fn emit(&mut self, record: &LogRecord) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Releases the destination. Records emitted afterwards may be rejected.
    fn close(&mut self) -> Result<(), SinkError> {
        self.flush()
    }
}

impl<S: LogSink + ?Sized> LogSink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn min_level(&self) -> Level {
        (**self).min_level()
    }

    fn accepts(&self, level: Level) -> bool {
        (**self).accepts(level)
    }

    fn emit(&mut self, record: &LogRecord) -> Result<(), SinkError> {
        (**self).emit(record)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<(), SinkError> {
        (**self).close()
    }
}
