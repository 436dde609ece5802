//! Events produced by the protocol clients.
//!
//! Each client pushes its own closed event enum into its own queue. The
//! gateway normalizes both into a leg-symmetric [`LegSignal`] so the session
//! state machine is written once for both directions.

pub mod sip;
pub mod telegram;

pub use sip::{RegistrationState, SipCallState, SipEvent};
pub use telegram::{AuthorizationState, TelegramCallState, TelegramEvent};

use serde::{Deserialize, Serialize};

use crate::common::types::{CallId, Remote, TerminationReason};

/// Side-independent view of what happened to one leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegSignal {
    /// A new inbound call appeared
    Incoming { remote: Remote },
    /// The leg is being set up (trying, ringing, negotiating keys)
    Progress,
    /// The leg is up: SIP confirmed, Telegram ready
    Established,
    /// The leg is gone
    Terminated { reason: TerminationReason },
}

/// Health of a whole side (SIP registration, Telegram authorization)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideStatus {
    Up,
    /// Intermediate state, nothing to do
    Pending(String),
    /// Every leg on the side must be considered lost
    Down(String),
}

/// Result of normalizing a client event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Leg { call_id: CallId, signal: LegSignal },
    Side(SideStatus),
}
