//! Error types for the notification engine.

use thiserror::Error;

/// Main error type for engine operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeraldError {
    #[error("Invalid pipe: {0}")]
    InvalidPipe(String),

    #[error("Cannot emit '{name}' after final state '{state}'")]
    EmitAfterFinalState { name: String, state: String },

    #[error("'{0}' is not a configured final state")]
    NotFinalState(String),

    #[error("Cannot observe: uniq observable already reached final state '{0}'")]
    UniqClosed(String),

    #[error("Cannot clear cache while observed")]
    ClearCacheWhileObserved,

    #[error("Cannot clear cache in final state '{0}'")]
    ClearCacheAfterFinalState(String),

    #[error("Observable no longer exists")]
    ObservableDropped,

    #[error("Unknown cache mode: {0}")]
    UnknownMode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for HeraldError {
    fn from(e: serde_json::Error) -> Self {
        HeraldError::Config(e.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, HeraldError>;
