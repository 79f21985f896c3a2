/// Structured error types for lntop
///
/// Each layer owns one enum. Topic-local failures never surface here as
/// errors: the hub turns them into `StreamDegraded` / `StreamRecovered`
/// events on the same queue that carries data.
use thiserror::Error;

use crate::events::Topic;

// =============================================================================
// NODE CLIENT ERRORS
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Bad credentials or certificate. Never retried.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Transport failure while establishing or keeping a session.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The node answered with a body we could not interpret.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl NodeError {
    pub fn is_retryable(&self) -> bool {
        match self {
            NodeError::Auth(_) => false,
            NodeError::Connection(_) => true,
            NodeError::Protocol(_) => true,
        }
    }
}

pub type NodeResult<T> = std::result::Result<T, NodeError>;

// =============================================================================
// CONFIGURATION ERRORS
// =============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {reason}")]
    Parse { path: String, reason: String },

    #[error("Invalid config field '{field}': {reason}")]
    Invalid { field: String, reason: String },

    #[error("File not found for '{field}': {path}")]
    FileNotFound { field: String, path: String },
}

// =============================================================================
// MODEL STORE ERRORS
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Model store already seeded")]
    AlreadySeeded,

    #[error("Model store not seeded: call seed() before apply()")]
    NotSeeded,
}

// =============================================================================
// HUB ERRORS
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("Hub already started (state={0})")]
    AlreadyStarted(&'static str),

    #[error("Hub has no topics configured")]
    NoTopics,

    #[error("All topics failed: {0:?}")]
    Exhausted(Vec<Topic>),
}

/// Raised by the normalizer for a payload it cannot interpret.
///
/// Never propagated past the normalizer: the notification is discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed {topic} payload: {reason}")]
pub struct MalformedPayload {
    pub topic: Topic,
    pub reason: String,
}

impl MalformedPayload {
    pub fn new(topic: Topic, reason: impl Into<String>) -> Self {
        Self {
            topic,
            reason: reason.into(),
        }
    }
}
