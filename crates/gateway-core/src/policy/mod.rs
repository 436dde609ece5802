//! Admission policy for incoming calls

use crate::common::types::{Direction, Remote, TerminationReason};

/// Decision taken for an incoming call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyAction {
    /// Accept the call and bridge it
    Allow,
    /// Refuse the call
    Reject { reason: TerminationReason },
}

/// Trait for implementing admission logic
pub trait PolicyEngine: Send + Sync {
    /// Evaluate an incoming call given the number of sessions still alive
    fn evaluate(&self, direction: Direction, remote: &Remote, active_sessions: usize) -> PolicyAction;
}

/// Caps the number of concurrent sessions; extra calls are refused as busy.
///
/// With the default of one, the gateway bridges a single call at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxSessionsPolicy {
    max_sessions: usize,
}

impl MaxSessionsPolicy {
    pub fn new(max_sessions: usize) -> Self {
        Self { max_sessions }
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }
}

impl Default for MaxSessionsPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}

impl PolicyEngine for MaxSessionsPolicy {
    fn evaluate(&self, _direction: Direction, _remote: &Remote, active_sessions: usize) -> PolicyAction {
        if active_sessions >= self.max_sessions {
            PolicyAction::Reject {
                reason: TerminationReason::Busy,
            }
        } else {
            PolicyAction::Allow
        }
    }
}
