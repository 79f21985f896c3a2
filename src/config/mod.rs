//! Configuration
//!
//! TOML file with `[network]`, `[logger]`, `[hub]` and `[views]` sections.
//! Loaded and validated once at startup, then passed by value.

pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::{Config, HubConfig, LoggingConfig, NetworkConfig, ViewsConfig};
pub use utils::{
    default_config_path, expand_tilde, load_config_from_path, parse_config, CONFIG_FILE_PATH,
};
