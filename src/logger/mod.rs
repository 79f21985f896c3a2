//! Structured logging for lntop
//!
//! A `Logger` is an explicit, cheaply clonable value handed to every component
//! at construction. There is no global logger.
//!
//! ```ignore
//! use lntop::logger::{LogTag, Logger, LoggerConfig};
//!
//! let logger = Logger::new(LoggerConfig::default())?;
//! logger.info(LogTag::Hub, "Hub started with 5 topics");
//! logger.debug(LogTag::Normalizer, "Discarded payload"); // only with --debug normalizer
//! ```

mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use self::core::{should_log, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

use chrono::Local;
use std::sync::Arc;

use file::LogFile;

struct LoggerInner {
    config: LoggerConfig,
    file: Option<LogFile>,
}

#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    /// Opens the log file (if configured) in append mode.
    pub fn new(config: LoggerConfig) -> std::io::Result<Self> {
        let file = match &config.file {
            Some(path) => Some(LogFile::open(path)?),
            None => None,
        };
        Ok(Self {
            inner: Arc::new(LoggerInner { config, file }),
        })
    }

    /// A logger that writes nowhere. Used by tests and library callers.
    pub fn silent() -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                config: LoggerConfig {
                    console: false,
                    ..Default::default()
                },
                file: None,
            }),
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.inner.config
    }

    pub fn enabled(&self, tag: LogTag, level: LogLevel) -> bool {
        let inner = &self.inner;
        (inner.config.console || inner.file.is_some()) && should_log(&inner.config, tag, level)
    }

    pub fn error(&self, tag: LogTag, message: &str) {
        self.log(tag, LogLevel::Error, message);
    }

    pub fn warning(&self, tag: LogTag, message: &str) {
        self.log(tag, LogLevel::Warning, message);
    }

    pub fn info(&self, tag: LogTag, message: &str) {
        self.log(tag, LogLevel::Info, message);
    }

    pub fn debug(&self, tag: LogTag, message: &str) {
        self.log(tag, LogLevel::Debug, message);
    }

    pub fn verbose(&self, tag: LogTag, message: &str) {
        self.log(tag, LogLevel::Verbose, message);
    }

    pub fn flush(&self) {
        if let Some(file) = &self.inner.file {
            file.flush();
        }
    }

    fn log(&self, tag: LogTag, level: LogLevel, message: &str) {
        if !self.enabled(tag, level) {
            return;
        }

        let now = Local::now();
        if self.inner.config.console {
            for line in format::console_lines(&now, tag, level, message) {
                format::print_stdout_safe(&line);
            }
        }
        if let Some(file) = &self.inner.file {
            file.write_line(&format::file_line(&now, tag, level, message));
        }
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.inner.config.min_level)
            .field("console", &self.inner.config.console)
            .field("file", &self.inner.config.file)
            .finish()
    }
}
