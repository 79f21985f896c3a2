/// Command-line arguments for lntop
///
/// `lntop` runs the hub with the terminal dashboard; `lntop pubsub` runs the
/// hub headless and logs every event. Debug tags use the logger's keys
/// (`node`, `hub`, `store`, ...).
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::default_config_path;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "lntop", version, about = "Live terminal dashboard for a Lightning node")]
pub struct Arguments {
    /// Configuration file (defaults to ~/.lntop/config.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log everything, including verbose messages
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug logging for a tag; may be repeated
    #[arg(long = "debug", value_name = "TAG")]
    pub debug: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the subscriptions without the dashboard and log every event
    Pubsub,
}

impl Arguments {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }

    pub fn is_pubsub(&self) -> bool {
        self.command == Some(Command::Pubsub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_dashboard() {
        let args = Arguments::try_parse_from(["lntop"]).unwrap();
        assert!(!args.is_pubsub());
        assert!(!args.verbose);
        assert!(args.debug.is_empty());
        assert_eq!(args.config_path(), default_config_path());
    }

    #[test]
    fn test_pubsub_with_flags() {
        let args = Arguments::try_parse_from([
            "lntop", "-c", "/tmp/lntop.toml", "--debug", "hub", "--debug", "node", "--verbose",
            "pubsub",
        ])
        .unwrap();
        assert!(args.is_pubsub());
        assert!(args.verbose);
        assert_eq!(args.debug, vec!["hub", "node"]);
        assert_eq!(args.config_path(), PathBuf::from("/tmp/lntop.toml"));
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Arguments::try_parse_from(["lntop", "trade"]).is_err());
    }
}
