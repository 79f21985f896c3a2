/// Filtering rules for the logger
///
/// 1. Errors are always shown
/// 2. Anything above the minimum level is dropped
/// 3. Debug requires the tag to be listed in `debug_tags`
/// 4. Verbose requires `--verbose`
use std::collections::HashSet;
use std::path::PathBuf;

use super::levels::LogLevel;
use super::tags::LogTag;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub debug_tags: HashSet<LogTag>,
    pub verbose: bool,
    /// Append plain lines to this file when set
    pub file: Option<PathBuf>,
    /// Print colored lines to stdout. Off while the dashboard owns the terminal.
    pub console: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            verbose: false,
            file: None,
            console: true,
        }
    }
}

pub fn should_log(config: &LoggerConfig, tag: LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }

    match level {
        LogLevel::Debug => config.verbose || config.debug_tags.contains(&tag),
        LogLevel::Verbose => config.verbose,
        _ => level <= config.min_level,
    }
}
