/// Configuration schemas
///
/// Every section is declared with `config_struct!`, so the defaults below are
/// also what an absent config file resolves to.
use crate::config_struct;

// ============================================================================
// NETWORK CONFIGURATION
// ============================================================================

config_struct! {
    /// Node connection settings (LND REST interface)
    pub struct NetworkConfig {
        /// Base URL of the REST interface
        address: String = "https://localhost:8080".to_string(),
        tls_cert_path: String = "~/.lnd/tls.cert".to_string(),
        macaroon_path: String = "~/.lnd/data/chain/bitcoin/mainnet/readonly.macaroon".to_string(),
        connect_timeout_secs: u64 = 10,
        /// Applies to snapshot queries only; subscriptions are long-lived
        request_timeout_secs: u64 = 30,
        /// Interval of the channel-balances refresh
        poll_interval_secs: u64 = 5,
    }
}

// ============================================================================
// LOGGER CONFIGURATION
// ============================================================================

config_struct! {
    pub struct LoggingConfig {
        /// error | warning | info | debug | verbose
        level: String = "info".to_string(),
        /// Log file; the dashboard writes logs only here
        file: Option<String> = Some("~/.lntop/lntop.log".to_string()),
        /// Tags with debug output enabled (see `--debug`)
        debug_tags: Vec<String> = Vec::new(),
    }
}

// ============================================================================
// HUB CONFIGURATION
// ============================================================================

config_struct! {
    /// Aggregation hub: topics, queue sizing and retry policy
    pub struct HubConfig {
        topics: Vec<String> = vec![
            "channel-state".to_string(),
            "channel-graph".to_string(),
            "invoices".to_string(),
            "transactions".to_string(),
            "htlcs".to_string(),
            "channel-balances".to_string(),
        ],
        /// Slots available to data events
        queue_capacity: usize = 1024,
        /// Extra slots per topic kept for health events
        reserved_slots: usize = 2,
        max_retries: u32 = 5,
        backoff_base_ms: u64 = 500,
        backoff_max_ms: u64 = 30_000,
        backoff_jitter: bool = true,
        /// Keep reconnecting at a slow pace after a topic degrades
        probe_after_degraded: bool = true,
        degraded_probe_secs: u64 = 60,
    }
}

// ============================================================================
// VIEWS CONFIGURATION
// ============================================================================

config_struct! {
    pub struct ViewsConfig {
        refresh_ms: u64 = 500,
        /// Rows in the recent events panel
        recent_events: usize = 12,
    }
}

// ============================================================================
// ROOT
// ============================================================================

config_struct! {
    pub struct Config {
        network: NetworkConfig = NetworkConfig::default(),
        logger: LoggingConfig = LoggingConfig::default(),
        hub: HubConfig = HubConfig::default(),
        views: ViewsConfig = ViewsConfig::default(),
    }
}
