//! # tg2sip gateway core
//!
//! Bridges calls between a SIP endpoint and a Telegram voice-call client.
//!
//! The two protocol clients run on their own threads and push normalized
//! events into one [`EventQueue`](tg2sip_infra_common::EventQueue) each. The
//! [`Gateway`] consumes both queues from a single dispatch loop, correlates
//! the legs into [`Session`]s, drives each session through its signaling state
//! machine and issues commands back to the clients.
//!
//! ## Architecture
//!
//! - `common`: identifiers and error types
//! - `events`: `SipEvent`, `TelegramEvent` and their leg-symmetric form
//! - `client`: the `SipClient` / `TelegramClient` boundary traits
//! - `session`: the session state machine and the session table
//! - `policy`: admission of incoming calls
//! - `routing`: destination of the dialed leg
//! - `gateway`: the dispatch loop
//! - `testing`: recording clients (feature `test-utils`)

pub mod client;
pub mod common;
pub mod events;
pub mod gateway;
pub mod policy;
pub mod routing;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export key types
pub use client::{ClientError, ClientResult, Readiness, SipClient, TelegramClient};
pub use common::errors::{GatewayError, Result};
pub use common::types::*;
pub use events::{
    AuthorizationState, RegistrationState, SipCallState, SipEvent, TelegramCallState, TelegramEvent,
};
pub use gateway::{Gateway, GatewayConfig, GatewayHandle, GatewayStats, RunningGateway};
pub use policy::{MaxSessionsPolicy, PolicyAction, PolicyEngine};
pub use routing::{RoutingEngine, StaticRouter};
pub use session::{Command, Session, SessionSnapshot, SessionState};
