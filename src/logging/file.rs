//! Per-day, per-source log files.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::record::DEFAULT_TIME_FORMAT;
use super::{Level, LogRecord, LogSink, SinkError};

/// Appends each record to `<dir>/<source>_<YYYY-MM-DD>.log`.
///
/// The day comes from the record's own timestamp. Files (and the directory)
/// are created on first write and flushed after every record. At most
/// `max_open` handles stay open; beyond that the least recently written one is
/// closed and reopened in append mode when its source logs again.
#[derive(Debug)]
pub struct DailyFileSink {
    dir: PathBuf,
    min_level: Level,
    time_format: String,
    max_open: usize,
    tick: u64,
    open: HashMap<String, OpenFile>,
}

/// Open handles kept by default.
pub const DEFAULT_MAX_OPEN_FILES: usize = 32;

#[derive(Debug)]
struct OpenFile {
    date: NaiveDate,
    path: PathBuf,
    file: File,
    last_used: u64,
}

impl DailyFileSink {
    pub fn new(dir: impl AsRef<Path>, min_level: Level) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            min_level,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            max_open: DEFAULT_MAX_OPEN_FILES,
            tick: 0,
            open: HashMap::new(),
        }
    }

    /// Caps how many files stay open at once. Zero is treated as one.
    pub fn with_max_open(mut self, max_open: usize) -> Self {
        self.max_open = max_open.max(1);
        self
    }

    pub fn with_time_format(mut self, time_format: impl Into<String>) -> Self {
        self.time_format = time_format.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file a `source` writes to on `date`.
    pub fn path_for(&self, source: &str, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}_{}.log", file_stem(source), date.format("%Y-%m-%d")))
    }

    fn file_for(&mut self, source: &str, date: NaiveDate) -> Result<&mut OpenFile, SinkError> {
        let stale = self
            .open
            .get(source)
            .is_some_and(|open| open.date != date);
        if stale {
            self.open.remove(source);
        }

        self.tick += 1;
        let tick = self.tick;

        if !self.open.contains_key(source) {
            if self.open.len() >= self.max_open {
                self.evict_oldest();
            }
            let path = self.path_for(source, date);
            fs::create_dir_all(&self.dir)
                .map_err(|e| SinkError::io(self.dir.display().to_string(), e))?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| SinkError::io(path.display().to_string(), e))?;
            self.open
                .insert(source.to_string(), OpenFile { date, path, file, last_used: tick });
        }

        let open = self
            .open
            .get_mut(source)
            .ok_or_else(|| SinkError::Rejected(format!("no open file for '{source}'")))?;
        open.last_used = tick;
        Ok(open)
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .open
            .iter()
            .min_by_key(|(_, open)| open.last_used)
            .map(|(source, _)| source.clone());
        if let Some(source) = oldest {
            self.open.remove(&source);
        }
    }
}

impl LogSink for DailyFileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    fn emit(&mut self, record: &LogRecord) -> Result<(), SinkError> {
        let line = record.render(&self.time_format);
        let date = record.timestamp().date_naive();
        let open = self.file_for(record.source(), date)?;

        writeln!(open.file, "{line}")
            .and_then(|()| open.file.flush())
            .map_err(|e| SinkError::io(open.path.display().to_string(), e))
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        for open in self.open.values_mut() {
            open.file
                .sync_data()
                .map_err(|e| SinkError::io(open.path.display().to_string(), e))?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let result = self.flush();
        self.open.clear();
        result
    }
}

/// Keeps source names usable as file names.
fn file_stem(source: &str) -> String {
    let stem: String = source
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        "log".to_string()
    } else {
        stem
    }
}
