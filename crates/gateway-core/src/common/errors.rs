//! Error types for the gateway core

use thiserror::Error;

use crate::common::types::{CallId, Side};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Call {call_id} on {side} already belongs to a session")]
    DuplicateLeg { side: Side, call_id: CallId },

    #[error("No route for call from {0}")]
    NoRoute(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to spawn dispatch thread: {0}")]
    Spawn(String),

    #[error("Dispatch loop panicked")]
    DispatchPanicked,
}

pub type Result<T> = std::result::Result<T, GatewayError>;
