use serde::{Deserialize, Serialize};
use std::fmt;

use super::{LegSignal, Normalized, SideStatus};
use crate::common::types::{CallId, Remote, TerminationReason};

/// Invite session state as reported by the SIP stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SipCallState {
    Calling,
    Ringing,
    Connecting,
    Confirmed,
    Disconnected,
}

/// Account registration state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationState {
    Registering,
    Registered,
    Unregistered,
    Failed(String),
}

/// Events emitted by the SIP client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SipEvent {
    IncomingCall { call_id: CallId, caller_id: String },
    CallStateChanged { call_id: CallId, state: SipCallState },
    CallTerminated { call_id: CallId, reason: TerminationReason },
    RegistrationStateChanged { state: RegistrationState },
}

impl SipEvent {
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            SipEvent::IncomingCall { call_id, .. }
            | SipEvent::CallStateChanged { call_id, .. }
            | SipEvent::CallTerminated { call_id, .. } => Some(*call_id),
            SipEvent::RegistrationStateChanged { .. } => None,
        }
    }

    pub fn normalize(self) -> Normalized {
        match self {
            SipEvent::IncomingCall { call_id, caller_id } => Normalized::Leg {
                call_id,
                signal: LegSignal::Incoming {
                    remote: Remote::SipCaller(caller_id),
                },
            },
            SipEvent::CallStateChanged { call_id, state } => {
                let signal = match state {
                    SipCallState::Calling | SipCallState::Ringing | SipCallState::Connecting => {
                        LegSignal::Progress
                    }
                    SipCallState::Confirmed => LegSignal::Established,
                    SipCallState::Disconnected => LegSignal::Terminated {
                        reason: TerminationReason::NormalClearing,
                    },
                };
                Normalized::Leg { call_id, signal }
            }
            SipEvent::CallTerminated { call_id, reason } => Normalized::Leg {
                call_id,
                signal: LegSignal::Terminated { reason },
            },
            SipEvent::RegistrationStateChanged { state } => Normalized::Side(match state {
                RegistrationState::Registered => SideStatus::Up,
                RegistrationState::Registering => SideStatus::Pending("registering".into()),
                RegistrationState::Unregistered => SideStatus::Down("unregistered".into()),
                RegistrationState::Failed(reason) => {
                    SideStatus::Down(format!("registration failed: {}", reason))
                }
            }),
        }
    }
}

impl fmt::Display for SipEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SipEvent::IncomingCall { call_id, caller_id } => {
                write!(f, "IncomingCall(call_id={}, caller={})", call_id, caller_id)
            }
            SipEvent::CallStateChanged { call_id, state } => {
                write!(f, "CallStateChanged(call_id={}, state={:?})", call_id, state)
            }
            SipEvent::CallTerminated { call_id, reason } => {
                write!(f, "CallTerminated(call_id={}, reason={})", call_id, reason)
            }
            SipEvent::RegistrationStateChanged { state } => {
                write!(f, "RegistrationStateChanged({:?})", state)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_states_map_to_signals() {
        let cases = [
            (SipCallState::Calling, LegSignal::Progress),
            (SipCallState::Ringing, LegSignal::Progress),
            (SipCallState::Connecting, LegSignal::Progress),
            (SipCallState::Confirmed, LegSignal::Established),
            (
                SipCallState::Disconnected,
                LegSignal::Terminated {
                    reason: TerminationReason::NormalClearing,
                },
            ),
        ];
        for (state, expected) in cases {
            let event = SipEvent::CallStateChanged {
                call_id: CallId(3),
                state,
            };
            assert_eq!(
                event.normalize(),
                Normalized::Leg {
                    call_id: CallId(3),
                    signal: expected
                }
            );
        }
    }

    #[test]
    fn test_registration_failure_is_side_down() {
        let event = SipEvent::RegistrationStateChanged {
            state: RegistrationState::Failed("403 Forbidden".into()),
        };
        match event.normalize() {
            Normalized::Side(SideStatus::Down(reason)) => assert!(reason.contains("403")),
            other => panic!("Expected side down, got {:?}", other),
        }
    }

    #[test]
    fn test_registration_event_has_no_call_id() {
        let event = SipEvent::RegistrationStateChanged {
            state: RegistrationState::Registered,
        };
        assert_eq!(event.call_id(), None);
    }
}
