//! One bridged call: a SIP leg and a Telegram leg driven through the
//! signaling state machine.
//!
//! ```text
//! Idle --(IncomingCall on leg A)--> Ringing
//! Ringing --(accept)--> Connecting            [answer A, dial B]
//! Connecting --(first event of leg B)--> BothRinging
//! BothRinging --(leg B established)--> Bridged
//! Bridged --(either leg terminated)--> Terminating   [hang up the survivor]
//! Terminating --(survivor terminated)--> Closed
//! any --(leg terminated before Bridged)--> Terminating
//! ```
//!
//! The machine is leg-symmetric: the origin may be either side. Transitions
//! return the [`Command`]s the gateway must issue; the session itself never
//! talks to a client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::common::types::{CallId, Destination, Direction, Remote, SessionId, Side, TerminationReason};
use crate::events::LegSignal;

/// Signaling state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Ringing,
    Connecting,
    BothRinging,
    Bridged,
    Terminating,
    Closed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }

    /// Still setting up: covered by the ringing timeout
    pub fn is_setup(self) -> bool {
        matches!(
            self,
            SessionState::Idle
                | SessionState::Ringing
                | SessionState::Connecting
                | SessionState::BothRinging
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Progress of a single leg as seen by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegPhase {
    /// No leg on this side yet
    Absent,
    /// Dial issued, leg id not known yet
    Awaiting,
    /// Leg exists and is being set up
    Alerting,
    Established,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leg {
    pub call_id: Option<CallId>,
    pub phase: LegPhase,
    /// A hangup was already issued; never issue a second one
    pub hangup_sent: bool,
}

impl Leg {
    fn absent() -> Self {
        Self {
            call_id: None,
            phase: LegPhase::Absent,
            hangup_sent: false,
        }
    }

    fn incoming(call_id: CallId) -> Self {
        Self {
            call_id: Some(call_id),
            phase: LegPhase::Alerting,
            hangup_sent: false,
        }
    }

    /// The leg exists (or is about to) and has not ended
    pub fn is_live(&self) -> bool {
        matches!(
            self.phase,
            LegPhase::Awaiting | LegPhase::Alerting | LegPhase::Established
        )
    }
}

/// Action the gateway must perform on a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Answer { side: Side, call_id: CallId },
    Reject { side: Side, call_id: CallId, reason: TerminationReason },
    Hangup { side: Side, call_id: CallId },
    Dial { destination: Destination },
}

impl Command {
    pub fn side(&self) -> Side {
        match self {
            Command::Answer { side, .. }
            | Command::Reject { side, .. }
            | Command::Hangup { side, .. } => *side,
            Command::Dial { destination } => destination.side(),
        }
    }
}

/// Why a session timed out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Setup took longer than the ringing timeout
    Ringing,
    /// Teardown did not complete in time
    Teardown,
}

/// Read-only view of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub direction: Direction,
    pub state: SessionState,
    pub sip_leg: Option<CallId>,
    pub tg_leg: Option<CallId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    direction: Direction,
    state: SessionState,
    sip: Leg,
    telegram: Leg,
    remote: Remote,
    created_at: DateTime<Utc>,
    started: Instant,
    state_since: Instant,
    bridged_at: Option<Instant>,
    end_reason: Option<TerminationReason>,
}

impl Session {
    /// New session for an incoming call on `origin`. Moves Idle -> Ringing.
    pub fn inbound(origin: Side, call_id: CallId, remote: Remote) -> Self {
        let now = Instant::now();
        let mut session = Self {
            id: SessionId::new(),
            direction: Direction::from_origin(origin),
            state: SessionState::Idle,
            sip: Leg::absent(),
            telegram: Leg::absent(),
            remote,
            created_at: Utc::now(),
            started: now,
            state_since: now,
            bridged_at: None,
            end_reason: None,
        };
        *session.leg_mut(origin) = Leg::incoming(call_id);
        session.transition(SessionState::Ringing);
        session
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn remote(&self) -> &Remote {
        &self.remote
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn leg(&self, side: Side) -> &Leg {
        match side {
            Side::Sip => &self.sip,
            Side::Telegram => &self.telegram,
        }
    }

    fn leg_mut(&mut self, side: Side) -> &mut Leg {
        match side {
            Side::Sip => &mut self.sip,
            Side::Telegram => &mut self.telegram,
        }
    }

    pub fn sip_leg(&self) -> Option<CallId> {
        self.sip.call_id
    }

    pub fn tg_leg(&self) -> Option<CallId> {
        self.telegram.call_id
    }

    pub fn end_reason(&self) -> Option<&TerminationReason> {
        self.end_reason.as_ref()
    }

    /// Time spent bridged, if the session ever got there
    pub fn bridged_for(&self) -> Option<Duration> {
        self.bridged_at.map(|at| at.elapsed())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            direction: self.direction,
            state: self.state,
            sip_leg: self.sip.call_id,
            tg_leg: self.telegram.call_id,
            created_at: self.created_at,
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        debug!(session = %self.id, from = %self.state, to = %next, "Session state transition");
        self.state = next;
        self.state_since = Instant::now();
        if next == SessionState::Bridged {
            self.bridged_at = Some(self.state_since);
            info!(
                session = %self.id,
                sip_leg = ?self.sip.call_id,
                tg_leg = ?self.telegram.call_id,
                "Session bridged"
            );
        }
    }

    /// Accept the incoming leg and dial the other side. Ringing -> Connecting.
    pub fn accept(&mut self, destination: Destination) -> Vec<Command> {
        let origin = self.direction.origin();
        let target = self.direction.target();
        if self.state != SessionState::Ringing || destination.side() != target {
            warn!(session = %self.id, state = %self.state, %destination, "Cannot accept session");
            return Vec::new();
        }
        let Some(call_id) = self.leg(origin).call_id else {
            return Vec::new();
        };

        self.transition(SessionState::Connecting);
        self.leg_mut(target).phase = LegPhase::Awaiting;

        vec![
            Command::Answer { side: origin, call_id },
            Command::Dial { destination },
        ]
    }

    /// Whether this session dialed `side` and still waits for the leg id
    pub fn awaits_leg(&self, side: Side) -> bool {
        let leg = self.leg(side);
        !self.state.is_terminal() && leg.phase == LegPhase::Awaiting && leg.call_id.is_none()
    }

    /// Attach the id of the dialed leg. If teardown already started, the new
    /// leg is hung up right away.
    pub fn bind_leg(&mut self, side: Side, call_id: CallId) -> Vec<Command> {
        self.leg_mut(side).call_id = Some(call_id);
        debug!(session = %self.id, %side, %call_id, "Bound dialed leg");
        if self.state == SessionState::Terminating {
            return self.hangup_leg(side).into_iter().collect();
        }
        Vec::new()
    }

    /// Feed a signal from one of this session's legs
    pub fn apply(&mut self, side: Side, signal: &LegSignal) -> Vec<Command> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        let target = self.direction.target();

        match signal {
            LegSignal::Incoming { .. } => {
                warn!(session = %self.id, %side, "Duplicate incoming call for existing leg ignored");
                Vec::new()
            }
            LegSignal::Progress => {
                let leg = self.leg_mut(side);
                if leg.phase == LegPhase::Awaiting {
                    leg.phase = LegPhase::Alerting;
                }
                if side == target && self.state == SessionState::Connecting {
                    self.transition(SessionState::BothRinging);
                }
                Vec::new()
            }
            LegSignal::Established => {
                let leg = self.leg_mut(side);
                if leg.phase == LegPhase::Ended {
                    return Vec::new();
                }
                leg.phase = LegPhase::Established;
                match self.state {
                    SessionState::Connecting | SessionState::BothRinging if side == target => {
                        self.transition(SessionState::BothRinging);
                        self.transition(SessionState::Bridged);
                        Vec::new()
                    }
                    // Came up after teardown started
                    SessionState::Terminating => self.hangup_leg(side).into_iter().collect(),
                    _ => Vec::new(),
                }
            }
            LegSignal::Terminated { reason } => self.leg_terminated(side, reason.clone()),
        }
    }

    fn leg_terminated(&mut self, side: Side, reason: TerminationReason) -> Vec<Command> {
        let leg = self.leg_mut(side);
        if leg.phase == LegPhase::Ended {
            return Vec::new();
        }
        leg.phase = LegPhase::Ended;
        debug!(session = %self.id, %side, %reason, "Leg terminated");
        if self.end_reason.is_none() {
            self.end_reason = Some(reason);
        }

        let other = side.opposite();
        if !self.leg(other).is_live() {
            // Both legs are gone: nothing left to hang up
            self.transition(SessionState::Closed);
            return Vec::new();
        }

        self.transition(SessionState::Terminating);
        self.hangup_leg(other).into_iter().collect()
    }

    /// Hang up one leg. Returns `None` when the leg is unbound, already ended
    /// or already hung up.
    pub fn hangup_leg(&mut self, side: Side) -> Option<Command> {
        let leg = self.leg_mut(side);
        match leg.call_id {
            Some(call_id) if leg.is_live() && !leg.hangup_sent => {
                leg.hangup_sent = true;
                Some(Command::Hangup { side, call_id })
            }
            _ => None,
        }
    }

    /// The client refused the dial outright, so the leg will never appear
    pub fn dial_failed(&mut self, side: Side, reason: TerminationReason) -> Vec<Command> {
        if !self.awaits_leg(side) {
            return Vec::new();
        }
        self.leg_terminated(side, reason)
    }

    /// Every leg on `side` is lost (registration/authorization went down,
    /// client closed its queue)
    pub fn side_lost(&mut self, side: Side, reason: TerminationReason) -> Vec<Command> {
        if self.state.is_terminal() || !self.leg(side).is_live() {
            return Vec::new();
        }
        self.leg_terminated(side, reason)
    }

    /// Start tearing down regardless of the legs' state (timeouts, shutdown)
    pub fn force_terminate(&mut self, reason: TerminationReason) -> Vec<Command> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        if self.end_reason.is_none() {
            self.end_reason = Some(reason);
        }
        let commands: Vec<Command> = [Side::Sip, Side::Telegram]
            .into_iter()
            .filter_map(|side| self.hangup_leg(side))
            .collect();

        if self.sip.is_live() || self.telegram.is_live() {
            self.transition(SessionState::Terminating);
        } else {
            self.transition(SessionState::Closed);
        }
        commands
    }

    /// Drop the session without waiting for the legs
    pub fn force_close(&mut self) {
        self.transition(SessionState::Closed);
    }

    /// Check the ringing and teardown deadlines
    pub fn expiry(&self, now: Instant, ring_timeout: Duration, teardown_timeout: Duration) -> Option<Expiry> {
        if self.state.is_setup() && now.saturating_duration_since(self.started) >= ring_timeout {
            return Some(Expiry::Ringing);
        }
        if self.state == SessionState::Terminating
            && now.saturating_duration_since(self.state_since) >= teardown_timeout
        {
            return Some(Expiry::Teardown);
        }
        None
    }
}
