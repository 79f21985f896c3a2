pub mod arguments;
pub mod config;
pub mod dashboard;
pub mod errors; // Structured error handling
pub mod events;
pub mod hub;
pub mod logger;
pub mod node;
pub mod normalizer;
pub mod run;
pub mod shutdown;
pub mod store;
