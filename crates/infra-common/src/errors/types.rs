use std::time::Duration;
use thiserror::Error;

/// Result alias used across the infrastructure crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the shared infrastructure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Push attempted on a closed event queue
    #[error("Event queue is closed")]
    QueueClosed,

    /// A bounded wait expired
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The global subscriber could not be installed
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// Internal invariant violated
    #[error("Internal error: {0}")]
    Internal(String),

    /// Free-form error, usually carrying attached context
    #[error("{0}")]
    Custom(String),
}
