//! Log batches and the sinks that persist them.
//!
//! A [`LogBatch`] is assembled per request: pick a level, point it at a
//! directory, choose a line template, add messages. A [`LogSink`] then
//! persists the rendered lines in one call.
//!
//! Templates recognise three placeholders: `%datetime%`, `%level%` and
//! `%message%`. The access log uses `"%message%"`, so a line is exactly the
//! serialized record.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::error::Error;

pub const DEFAULT_FORMAT: &str = "[%datetime%] %level%: %message%";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug   => "DEBUG",
            Self::Info    => "INFO",
            Self::Warning => "WARNING",
            Self::Error   => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── LogBatch ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct LogBatch {
    level: Level,
    directory: PathBuf,
    format: String,
    messages: Vec<String>,
}

impl LogBatch {
    pub fn for_level(level: Level) -> Self {
        Self {
            level,
            directory: PathBuf::new(),
            format: DEFAULT_FORMAT.to_owned(),
            messages: Vec::new(),
        }
    }

    pub fn info() -> Self {
        Self::for_level(Level::Info)
    }

    /// Directory relative to the sink's root.
    pub fn set_directory(&mut self, directory: impl Into<PathBuf>) -> &mut Self {
        self.directory = directory.into();
        self
    }

    pub fn set_format(&mut self, format: impl Into<String>) -> &mut Self {
        self.format = format.into();
        self
    }

    /// Strings are added verbatim; anything else as compact JSON.
    pub fn add<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<&mut Self, Error> {
        let message = match serde_json::to_value(message)? {
            Value::String(s) => s,
            other => other.to_string(),
        };
        self.messages.push(message);
        Ok(self)
    }

    pub fn level(&self) -> Level { self.level }
    pub fn directory(&self) -> &Path { &self.directory }
    pub fn is_empty(&self) -> bool { self.messages.is_empty() }

    /// Renders every message through the template.
    pub fn lines(&self) -> Vec<String> {
        let mut head = self.format.replace("%level%", self.level.as_str());
        if head.contains("%datetime%") {
            let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            head = head.replace("%datetime%", &now);
        }
        // %message% last, so placeholders inside messages stay untouched.
        self.messages
            .iter()
            .map(|message| head.replace("%message%", message))
            .collect()
    }
}

// ── Sinks ─────────────────────────────────────────────────────────────────────

/// Persists a finished [`LogBatch`]. Called once per batch, synchronously.
pub trait LogSink: Send + Sync + 'static {
    fn flush(&self, batch: LogBatch) -> Result<(), Error>;
}

/// Writes lines to `root/<directory>/<YYYY-MM-DD>.log`, rotated daily.
pub struct FileSink {
    root: PathBuf,
    appenders: Mutex<HashMap<PathBuf, RollingFileAppender>>,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), appenders: Mutex::new(HashMap::new()) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl LogSink for FileSink {
    fn flush(&self, batch: LogBatch) -> Result<(), Error> {
        if batch.is_empty() {
            return Ok(());
        }

        let dir = self.root.join(batch.directory());
        let mut appenders = self.appenders.lock().unwrap_or_else(PoisonError::into_inner);

        let appender = match appenders.entry(dir) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                std::fs::create_dir_all(e.key())?;
                let appender = RollingFileAppender::builder()
                    .rotation(Rotation::DAILY)
                    .filename_suffix("log")
                    .build(e.key())?;
                e.insert(appender)
            }
        };

        for line in batch.lines() {
            appender.write_all(line.as_bytes())?;
            appender.write_all(b"\n")?;
        }
        appender.flush()?;
        Ok(())
    }
}

/// Emits each line as a `tracing` event with target `access_log`, leaving
/// persistence to whatever subscriber the application installed.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn flush(&self, batch: LogBatch) -> Result<(), Error> {
        let directory = batch.directory().display().to_string();
        for line in batch.lines() {
            match batch.level() {
                Level::Debug   => tracing::debug!(target: "access_log", %directory, "{line}"),
                Level::Info    => tracing::info!(target: "access_log", %directory, "{line}"),
                Level::Warning => tracing::warn!(target: "access_log", %directory, "{line}"),
                Level::Error   => tracing::error!(target: "access_log", %directory, "{line}"),
            }
        }
        Ok(())
    }
}

/// Keeps `(directory, line)` pairs in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(PathBuf, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(PathBuf, String)> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemorySink {
    fn flush(&self, batch: LogBatch) -> Result<(), Error> {
        let directory = batch.directory().to_path_buf();
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.extend(batch.lines().into_iter().map(|line| (directory.clone(), line)));
        Ok(())
    }
}

impl<S: LogSink> LogSink for std::sync::Arc<S> {
    fn flush(&self, batch: LogBatch) -> Result<(), Error> {
        (**self).flush(batch)
    }
}
