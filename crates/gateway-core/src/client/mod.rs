//! Boundary contracts of the two protocol clients.
//!
//! The SIP stack and the Telegram client live outside this crate. The gateway
//! only sees them through these traits: commands go in as fire-and-forget
//! calls that hand the action to the client's own thread, results come back
//! later as events on the client's queue.

use std::time::Duration;
use thiserror::Error;

use tg2sip_infra_common::ReadyLatch;

use crate::common::types::{CallId, TerminationReason};

pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned synchronously by a client command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Client already started")]
    AlreadyStarted,

    #[error("Client is not started")]
    NotStarted,

    /// The client shut down and closed its event queue
    #[error("Client is closed")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// SIP side. Registration proceeds asynchronously after `start` and is
/// reported through `RegistrationStateChanged` events.
pub trait SipClient: Send + Sync {
    /// Begin internal processing. A second call fails with `AlreadyStarted`.
    fn start(&self) -> ClientResult<()>;

    /// Answer an incoming call
    fn answer(&self, call_id: CallId) -> ClientResult<()>;

    /// Refuse an incoming call
    fn reject(&self, call_id: CallId, reason: &TerminationReason) -> ClientResult<()>;

    /// Terminate a call in any state
    fn hangup(&self, call_id: CallId) -> ClientResult<()>;

    /// Place an outbound call. The new leg's id is learned from its first event.
    fn dial(&self, destination: &str) -> ClientResult<()>;
}

/// Telegram side. Authorization is multi-step and may fail, so readiness is
/// exposed explicitly and waited for with a deadline.
pub trait TelegramClient: Send + Sync {
    /// Begin internal processing. A second call fails with `AlreadyStarted`.
    fn start(&self) -> ClientResult<()>;

    /// Resolves once the session is authorized and connected
    fn readiness(&self) -> Readiness;

    /// Accept an incoming call
    fn accept(&self, call_id: CallId) -> ClientResult<()>;

    /// Discard a call in any state (used for both reject and hang up)
    fn discard(&self, call_id: CallId, reason: &TerminationReason) -> ClientResult<()>;

    /// Call a user. The new leg's id is learned from its first event.
    fn dial(&self, peer_id: i64) -> ClientResult<()>;
}

/// Request/response readiness with a deadline.
///
/// The client resolves it once (`true` when ready, `false` when startup
/// failed); the caller waits at most a bounded time and treats anything but
/// `true` as not ready.
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    latch: ReadyLatch<bool>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the readiness. Only the first resolution counts.
    pub fn resolve(&self, ready: bool) -> bool {
        self.latch.set(ready)
    }

    /// Current value without waiting
    pub fn peek(&self) -> Option<bool> {
        self.latch.peek()
    }

    /// Wait up to `timeout`; `true` only if resolved ready in time
    pub fn wait(&self, timeout: Duration) -> bool {
        self.latch.wait_timeout(timeout).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_readiness_resolved_false_is_not_ready() {
        let readiness = Readiness::new();
        readiness.resolve(false);
        assert!(!readiness.wait(Duration::from_millis(10)));
        assert_eq!(readiness.peek(), Some(false));
    }

    #[test]
    fn test_readiness_unresolved_times_out() {
        let readiness = Readiness::new();
        assert!(!readiness.wait(Duration::from_millis(20)));
        assert_eq!(readiness.peek(), None);
    }

    #[test]
    fn test_readiness_resolved_from_client_thread() {
        let readiness = Readiness::new();
        let client_side = readiness.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            client_side.resolve(true);
        });
        assert!(readiness.wait(Duration::from_secs(5)));
        handle.join().unwrap();
    }
}
