/// Log level definitions for structured logging
///
/// Levels are ordered by severity (Error < Warning < Info < Debug < Verbose)
/// so a minimum threshold filters everything above it.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,   // Always shown
    Warning = 1, // Degraded topics, reconnects
    Info = 2,    // Lifecycle messages (default)
    Debug = 3,   // Discarded payloads, per-event detail (gated by --debug TAG)
    Verbose = 4, // Raw notifications (gated by --verbose)
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Verbose => "VERBOSE",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ERROR" => Some(LogLevel::Error),
            "WARNING" | "WARN" => Some(LogLevel::Warning),
            "INFO" => Some(LogLevel::Info),
            "DEBUG" => Some(LogLevel::Debug),
            "VERBOSE" | "TRACE" => Some(LogLevel::Verbose),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error < LogLevel::Warning);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Verbose);
    }

    #[test]
    fn test_level_from_name() {
        assert_eq!(LogLevel::from_name("warn"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::from_name(" Info "), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_name("trace"), Some(LogLevel::Verbose));
        assert_eq!(LogLevel::from_name("loud"), None);
    }
}
