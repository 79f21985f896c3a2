/// Log tags identify the subsystem a message comes from.
///
/// The debug key is what `--debug TAG` and `logger.debug_tags` match against.
use colored::{ColoredString, Colorize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Node,
    Normalizer,
    Hub,
    Store,
    Dashboard,
}

impl LogTag {
    pub const ALL: [LogTag; 7] = [
        LogTag::System,
        LogTag::Config,
        LogTag::Node,
        LogTag::Normalizer,
        LogTag::Hub,
        LogTag::Store,
        LogTag::Dashboard,
    ];

    /// Uppercase label shown in the log prefix
    pub fn to_plain_string(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Node => "NODE",
            LogTag::Normalizer => "NORMALIZE",
            LogTag::Hub => "HUB",
            LogTag::Store => "STORE",
            LogTag::Dashboard => "DASHBOARD",
        }
    }

    pub fn to_debug_key(&self) -> &'static str {
        match self {
            LogTag::System => "system",
            LogTag::Config => "config",
            LogTag::Node => "node",
            LogTag::Normalizer => "normalizer",
            LogTag::Hub => "hub",
            LogTag::Store => "store",
            LogTag::Dashboard => "dashboard",
        }
    }

    pub fn from_debug_key(key: &str) -> Option<Self> {
        let key = key.trim().to_lowercase();
        Self::ALL.into_iter().find(|tag| tag.to_debug_key() == key)
    }

    pub(crate) fn colorize(&self, padded: String) -> ColoredString {
        match self {
            LogTag::System => padded.bright_yellow().bold(),
            LogTag::Config => padded.bright_white().bold(),
            LogTag::Node => padded.bright_cyan().bold(),
            LogTag::Normalizer => padded.bright_blue().bold(),
            LogTag::Hub => padded.bright_magenta().bold(),
            LogTag::Store => padded.bright_green().bold(),
            LogTag::Dashboard => padded.bright_purple().bold(),
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
