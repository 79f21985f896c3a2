/// Configuration loading and validation
///
/// The config is read once at startup and passed around by value. A missing
/// file resolves to defaults; a present but invalid one is fatal.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::schemas::{Config, HubConfig, LoggingConfig, NetworkConfig};
use crate::errors::ConfigError;
use crate::events::Topic;
use crate::logger::{LogLevel, LogTag, LoggerConfig};

/// Default configuration file, relative to the home directory
pub const CONFIG_FILE_PATH: &str = "~/.lntop/config.toml";

pub fn default_config_path() -> PathBuf {
    expand_tilde(CONFIG_FILE_PATH)
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Load configuration from a specific file path, falling back to defaults
/// when the file does not exist.
pub fn load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    parse_config(&contents).map_err(|reason| ConfigError::Parse {
        path: path.display().to_string(),
        reason,
    })
}

pub fn parse_config(contents: &str) -> Result<Config, String> {
    toml::from_str::<Config>(contents).map_err(|e| e.to_string())
}

impl Config {
    /// Validate every section. Credential files must exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate()?;
        self.logger.log_level()?;
        self.logger.debug_log_tags()?;
        self.hub.validate()?;

        if self.views.refresh_ms == 0 {
            return Err(invalid("views.refresh_ms", "must be greater than zero"));
        }
        Ok(())
    }
}

impl NetworkConfig {
    pub fn tls_cert(&self) -> PathBuf {
        expand_tilde(&self.tls_cert_path)
    }

    pub fn macaroon(&self) -> PathBuf {
        expand_tilde(&self.macaroon_path)
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.address.trim_end_matches('/')
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.address.starts_with("https://") || self.address.starts_with("http://")) {
            return Err(invalid(
                "network.address",
                &format!("'{}' must start with https:// or http://", self.address),
            ));
        }
        for (field, path) in [
            ("network.tls_cert_path", self.tls_cert()),
            ("network.macaroon_path", self.macaroon()),
        ] {
            if !path.is_file() {
                return Err(ConfigError::FileNotFound {
                    field: field.to_string(),
                    path: path.display().to_string(),
                });
            }
        }
        if self.poll_interval_secs == 0 {
            return Err(invalid("network.poll_interval_secs", "must be greater than zero"));
        }
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(invalid("network.*_timeout_secs", "must be greater than zero"));
        }
        Ok(())
    }
}

impl LoggingConfig {
    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        LogLevel::from_name(&self.level)
            .ok_or_else(|| invalid("logger.level", &format!("unknown level '{}'", self.level)))
    }

    pub fn debug_log_tags(&self) -> Result<HashSet<LogTag>, ConfigError> {
        parse_tags(&self.debug_tags, "logger.debug_tags")
    }

    /// Combine this section with command-line flags.
    pub fn to_logger_config(
        &self,
        verbose: bool,
        extra_debug_tags: &[String],
        console: bool,
    ) -> Result<LoggerConfig, ConfigError> {
        let mut debug_tags = self.debug_log_tags()?;
        debug_tags.extend(parse_tags(extra_debug_tags, "--debug")?);

        let min_level = if verbose {
            LogLevel::Verbose
        } else {
            self.log_level()?
        };

        Ok(LoggerConfig {
            min_level,
            debug_tags,
            verbose,
            file: self.file.as_deref().map(expand_tilde),
            console,
        })
    }
}

impl HubConfig {
    /// Configured topics in order, duplicates removed.
    pub fn parsed_topics(&self) -> Result<Vec<Topic>, ConfigError> {
        let mut topics = Vec::with_capacity(self.topics.len());
        for code in &self.topics {
            let topic = Topic::from_code(code)
                .ok_or_else(|| invalid("hub.topics", &format!("unknown topic '{}'", code)))?;
            if !topics.contains(&topic) {
                topics.push(topic);
            }
        }
        Ok(topics)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.parsed_topics()?.is_empty() {
            return Err(invalid("hub.topics", "at least one topic is required"));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("hub.queue_capacity", "must be greater than zero"));
        }
        if self.reserved_slots == 0 {
            return Err(invalid(
                "hub.reserved_slots",
                "must be greater than zero to deliver health events under backpressure",
            ));
        }
        if self.backoff_base_ms == 0 {
            return Err(invalid("hub.backoff_base_ms", "must be greater than zero"));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(invalid(
                "hub.backoff_max_ms",
                "must not be smaller than hub.backoff_base_ms",
            ));
        }
        if self.probe_after_degraded && self.degraded_probe_secs == 0 {
            return Err(invalid("hub.degraded_probe_secs", "must be greater than zero"));
        }
        Ok(())
    }
}

fn parse_tags(keys: &[String], field: &str) -> Result<HashSet<LogTag>, ConfigError> {
    keys.iter()
        .map(|key| {
            LogTag::from_debug_key(key)
                .ok_or_else(|| invalid(field, &format!("unknown log tag '{}'", key)))
        })
        .collect()
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn credentials(dir: &Path) -> (String, String) {
        let cert = dir.join("tls.cert");
        let macaroon = dir.join("readonly.macaroon");
        std::fs::write(&cert, "-----BEGIN CERTIFICATE-----\n").unwrap();
        std::fs::write(&macaroon, [0x02u8, 0x01, 0x03]).unwrap();
        (
            cert.display().to_string(),
            macaroon.display().to_string(),
        )
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.address, "https://localhost:8080");
        assert_eq!(config.hub.reserved_slots, 2);
        assert_eq!(config.hub.parsed_topics().unwrap().len(), 6);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from_path(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[hub]\ntopics = [\"invoices\", \"on-chain\", \"invoices\"]\nmax_retries = 3\n\n[views]\nrecent_events = 4"
        )
        .unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.hub.max_retries, 3);
        assert_eq!(config.hub.backoff_max_ms, 30_000);
        assert_eq!(config.views.recent_events, 4);
        assert_eq!(
            config.hub.parsed_topics().unwrap(),
            vec![Topic::Invoices, Topic::Transactions]
        );
    }

    #[test]
    fn test_unparseable_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[hub\nqueue_capacity = ").unwrap();
        assert!(matches!(
            load_config_from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_unknown_key_is_error() {
        assert!(parse_config("[hub]\nqueue_size = 10").is_err());
    }

    #[test]
    fn test_validate_requires_credentials() {
        let config = Config {
            network: NetworkConfig {
                tls_cert_path: "/nonexistent/tls.cert".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        match config.validate() {
            Err(ConfigError::FileNotFound { field, .. }) => {
                assert_eq!(field, "network.tls_cert_path")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_bad_hub_values() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, macaroon) = credentials(dir.path());
        let mut config = Config::default();
        config.network.tls_cert_path = cert;
        config.network.macaroon_path = macaroon;
        config.validate().unwrap();

        config.hub.topics = vec!["mempool".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        config.hub = HubConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.hub = HubConfig {
            reserved_slots: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "hub.reserved_slots"
        ));

        config.hub = HubConfig {
            backoff_base_ms: 10_000,
            backoff_max_ms: 1_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_logger_config_merges_flags() {
        let section = LoggingConfig {
            level: "warning".to_string(),
            file: None,
            debug_tags: vec!["hub".to_string()],
        };
        let merged = section
            .to_logger_config(false, &["normalizer".to_string()], false)
            .unwrap();
        assert_eq!(merged.min_level, LogLevel::Warning);
        assert!(merged.debug_tags.contains(&LogTag::Hub));
        assert!(merged.debug_tags.contains(&LogTag::Normalizer));
        assert!(!merged.console);

        assert!(section
            .to_logger_config(false, &["wallet".to_string()], true)
            .is_err());
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/.lnd/tls.cert"), home.join(".lnd/tls.cert"));
        }
        assert_eq!(expand_tilde("/etc/lnd"), PathBuf::from("/etc/lnd"));
    }
}
