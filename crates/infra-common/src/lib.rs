//! # tg2sip infra-common
//!
//! Shared building blocks for the gateway crates:
//!
//! - `events`: the closeable blocking [`EventQueue`] used as the only hand-off
//!   between protocol client threads and the gateway, plus the one-shot
//!   [`ReadyLatch`] used for bounded readiness waits.
//! - `errors`: the common error type and component/operation context.
//! - `logging`: `tracing-subscriber` setup.

pub mod errors;
pub mod events;
pub mod logging;

pub use errors::types::{Error, Result};
pub use events::latch::ReadyLatch;
pub use events::queue::{EventQueue, QueueClosed, Recv};
pub use logging::setup::{setup_logging, LoggingConfig};
