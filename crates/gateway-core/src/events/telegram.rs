use serde::{Deserialize, Serialize};
use std::fmt;

use super::{LegSignal, Normalized, SideStatus};
use crate::common::types::{CallId, Remote, TerminationReason};

/// Telegram call state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TelegramCallState {
    Pending,
    ExchangingKeys,
    Ready,
    Discarded,
}

/// Authorization state of the Telegram session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizationState {
    WaitParameters,
    WaitCode,
    WaitPassword,
    Ready,
    LoggingOut,
    Closed,
}

/// Events emitted by the Telegram client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TelegramEvent {
    IncomingCall { call_id: CallId, peer_id: i64 },
    CallStateChanged { call_id: CallId, state: TelegramCallState },
    CallDiscarded { call_id: CallId, reason: TerminationReason },
    AuthorizationStateChanged { state: AuthorizationState },
}

impl TelegramEvent {
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            TelegramEvent::IncomingCall { call_id, .. }
            | TelegramEvent::CallStateChanged { call_id, .. }
            | TelegramEvent::CallDiscarded { call_id, .. } => Some(*call_id),
            TelegramEvent::AuthorizationStateChanged { .. } => None,
        }
    }

    pub fn normalize(self) -> Normalized {
        match self {
            TelegramEvent::IncomingCall { call_id, peer_id } => Normalized::Leg {
                call_id,
                signal: LegSignal::Incoming {
                    remote: Remote::TelegramPeer(peer_id),
                },
            },
            TelegramEvent::CallStateChanged { call_id, state } => {
                let signal = match state {
                    TelegramCallState::Pending | TelegramCallState::ExchangingKeys => {
                        LegSignal::Progress
                    }
                    TelegramCallState::Ready => LegSignal::Established,
                    TelegramCallState::Discarded => LegSignal::Terminated {
                        reason: TerminationReason::NormalClearing,
                    },
                };
                Normalized::Leg { call_id, signal }
            }
            TelegramEvent::CallDiscarded { call_id, reason } => Normalized::Leg {
                call_id,
                signal: LegSignal::Terminated { reason },
            },
            TelegramEvent::AuthorizationStateChanged { state } => Normalized::Side(match state {
                AuthorizationState::Ready => SideStatus::Up,
                AuthorizationState::LoggingOut | AuthorizationState::Closed => {
                    SideStatus::Down(format!("authorization {:?}", state))
                }
                other => SideStatus::Pending(format!("authorization {:?}", other)),
            }),
        }
    }
}

impl fmt::Display for TelegramEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelegramEvent::IncomingCall { call_id, peer_id } => {
                write!(f, "IncomingCall(call_id={}, peer={})", call_id, peer_id)
            }
            TelegramEvent::CallStateChanged { call_id, state } => {
                write!(f, "CallStateChanged(call_id={}, state={:?})", call_id, state)
            }
            TelegramEvent::CallDiscarded { call_id, reason } => {
                write!(f, "CallDiscarded(call_id={}, reason={})", call_id, reason)
            }
            TelegramEvent::AuthorizationStateChanged { state } => {
                write!(f, "AuthorizationStateChanged({:?})", state)
            }
        }
    }
}
