//! In-memory display buffer for a UI log pane.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use super::record::DEFAULT_TIME_FORMAT;
use super::{Level, LogRecord, LogSink, SinkError};

/// Shared buffer of rendered lines. Clones share the same storage, so the UI
/// thread keeps one handle and the sink another.
#[derive(Clone, Default)]
pub struct UiBuffer {
    inner: Arc<Mutex<BufferState>>,
}

#[derive(Default)]
struct BufferState {
    lines: VecDeque<String>,
    capacity: Option<usize>,
}

impl UiBuffer {
    /// An unbounded buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer keeping at most `capacity` lines, evicting the oldest first.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BufferState {
                lines: VecDeque::new(),
                capacity: Some(capacity),
            })),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut BufferState) -> R) -> R {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub(crate) fn push(&self, line: String) {
        self.with_state(|state| {
            if state.capacity == Some(0) {
                return;
            }
            state.lines.push_back(line);
            if let Some(capacity) = state.capacity {
                while state.lines.len() > capacity {
                    state.lines.pop_front();
                }
            }
        });
    }

    pub fn lines(&self) -> Vec<String> {
        self.with_state(|state| state.lines.iter().cloned().collect())
    }

    /// All lines joined with newlines, ready for a text widget.
    pub fn text(&self) -> String {
        self.with_state(|state| {
            state
                .lines
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("\n")
        })
    }

    pub fn len(&self) -> usize {
        self.with_state(|state| state.lines.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.with_state(|state| state.lines.clear());
    }
}

impl fmt::Debug for UiBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_state(|state| {
            f.debug_struct("UiBuffer")
                .field("lines", &state.lines.len())
                .field("capacity", &state.capacity)
                .finish()
        })
    }
}

type LineCallback = Box<dyn FnMut(&str) + Send>;

/// Appends rendered records to a [`UiBuffer`] and optionally notifies a callback.
pub struct UiSink {
    buffer: UiBuffer,
    min_level: Level,
    time_format: String,
    on_line: Option<LineCallback>,
}

impl UiSink {
    pub fn new(buffer: UiBuffer, min_level: Level) -> Self {
        Self {
            buffer,
            min_level,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            on_line: None,
        }
    }

    pub fn with_time_format(mut self, time_format: impl Into<String>) -> Self {
        self.time_format = time_format.into();
        self
    }

    /// Called with each rendered line after it is buffered, e.g. to wake the UI thread.
    pub fn with_callback(mut self, on_line: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_line = Some(Box::new(on_line));
        self
    }

    pub fn buffer(&self) -> &UiBuffer {
        &self.buffer
    }
}

impl fmt::Debug for UiSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiSink")
            .field("buffer", &self.buffer)
            .field("min_level", &self.min_level)
            .field("callback", &self.on_line.is_some())
            .finish()
    }
}

impl LogSink for UiSink {
    fn name(&self) -> &str {
        "ui"
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    fn emit(&mut self, record: &LogRecord) -> Result<(), SinkError> {
        let line = record.render(&self.time_format);
        if let Some(on_line) = self.on_line.as_mut() {
            on_line(&line);
        }
        self.buffer.push(line);
        Ok(())
    }
}
