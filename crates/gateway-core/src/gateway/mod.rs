//! The gateway: correlates SIP and Telegram legs into sessions.
//!
//! A single dispatch loop multiplexes both event queues. It alternates a
//! non-blocking check on each queue with a short blocking wait, so events from
//! the same queue are handled in arrival order and each event is fully
//! processed (including the commands it triggers) before the next one from
//! either queue. The session table is owned by that loop alone.

pub mod config;
pub mod stats;

pub use config::GatewayConfig;
pub use stats::GatewayStats;

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use tg2sip_infra_common::{EventQueue, Recv};

use crate::client::{ClientError, ClientResult, SipClient, TelegramClient};
use crate::common::errors::{GatewayError, Result};
use crate::common::types::{CallId, Destination, Direction, Remote, SessionId, Side, TerminationReason};
use crate::events::{LegSignal, Normalized, SideStatus, SipEvent, TelegramEvent};
use crate::policy::{MaxSessionsPolicy, PolicyAction, PolicyEngine};
use crate::routing::{RoutingEngine, StaticRouter};
use crate::session::{Command, Expiry, Session, SessionSnapshot, SessionState, SessionTable};

pub struct Gateway {
    config: GatewayConfig,
    sip: Arc<dyn SipClient>,
    telegram: Arc<dyn TelegramClient>,
    sip_events: EventQueue<SipEvent>,
    tg_events: EventQueue<TelegramEvent>,
    sessions: SessionTable,
    policy: Box<dyn PolicyEngine>,
    router: Box<dyn RoutingEngine>,
    stats: GatewayStats,
}

/// Stops a running gateway by closing both event queues
#[derive(Clone)]
pub struct GatewayHandle {
    sip_events: EventQueue<SipEvent>,
    tg_events: EventQueue<TelegramEvent>,
}

impl GatewayHandle {
    /// Close both queues. Already queued events are still processed and
    /// every live leg is hung up once before the loop returns.
    pub fn shutdown(&self) {
        self.sip_events.close();
        self.tg_events.close();
    }
}

/// A gateway dispatching on its own thread
pub struct RunningGateway {
    handle: GatewayHandle,
    join: JoinHandle<GatewayStats>,
}

impl RunningGateway {
    pub fn handle(&self) -> GatewayHandle {
        self.handle.clone()
    }

    /// Shut down and wait for the dispatch loop to finish
    pub fn shutdown(self) -> Result<GatewayStats> {
        self.handle.shutdown();
        self.join()
    }

    /// Wait for the dispatch loop to finish on its own
    pub fn join(self) -> Result<GatewayStats> {
        self.join.join().map_err(|_| GatewayError::DispatchPanicked)
    }
}

impl Gateway {
    /// Wire a gateway to both clients and their event queues
    pub fn new(
        sip: Arc<dyn SipClient>,
        telegram: Arc<dyn TelegramClient>,
        sip_events: EventQueue<SipEvent>,
        tg_events: EventQueue<TelegramEvent>,
        config: GatewayConfig,
    ) -> Result<Self> {
        config.validate()?;
        let policy = Box::new(MaxSessionsPolicy::new(config.max_sessions));
        let router = Box::new(StaticRouter::new(
            config.telegram_callback_peer,
            config.sip_callback_uri.clone(),
        ));
        Ok(Self {
            config,
            sip,
            telegram,
            sip_events,
            tg_events,
            sessions: SessionTable::new(),
            policy,
            router,
            stats: GatewayStats::default(),
        })
    }

    /// Replace the admission policy
    pub fn with_policy(mut self, policy: Box<dyn PolicyEngine>) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the router
    pub fn with_router(mut self, router: Box<dyn RoutingEngine>) -> Self {
        self.router = router;
        self
    }

    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle {
            sip_events: self.sip_events.clone(),
            tg_events: self.tg_events.clone(),
        }
    }

    pub fn stats(&self) -> GatewayStats {
        self.stats
    }

    /// Snapshot of every session currently in the table
    pub fn sessions(&self) -> Vec<SessionSnapshot> {
        self.sessions.snapshots()
    }

    /// Run the dispatch loop on a dedicated thread
    pub fn spawn(self) -> Result<RunningGateway> {
        let handle = self.handle();
        let join = thread::Builder::new()
            .name("gateway".into())
            .spawn(move || self.run())
            .map_err(|e| GatewayError::Spawn(e.to_string()))?;
        Ok(RunningGateway { handle, join })
    }

    /// Run the dispatch loop on the calling thread until both queues are
    /// closed and drained. Remaining sessions are then forced closed.
    pub fn run(mut self) -> GatewayStats {
        info!(
            max_sessions = self.config.max_sessions,
            ring_timeout = ?self.config.ring_timeout,
            "Gateway dispatch loop started"
        );
        let poll = self.config.poll_interval;
        let mut sip_open = true;
        let mut tg_open = true;
        let mut wait_on_sip = true;

        while sip_open || tg_open {
            let mut handled = false;

            if sip_open {
                match self.sip_events.try_pop() {
                    Recv::Item(event) => {
                        self.handle_sip_event(event);
                        handled = true;
                    }
                    Recv::Closed => {
                        sip_open = false;
                        self.queue_closed(Side::Sip);
                    }
                    Recv::Empty => {}
                }
            }
            if tg_open {
                match self.tg_events.try_pop() {
                    Recv::Item(event) => {
                        self.handle_telegram_event(event);
                        handled = true;
                    }
                    Recv::Closed => {
                        tg_open = false;
                        self.queue_closed(Side::Telegram);
                    }
                    Recv::Empty => {}
                }
            }

            self.tick(Instant::now());

            if handled || !(sip_open || tg_open) {
                continue;
            }

            // Both idle: short blocking wait, alternating between open queues
            let wait_sip = sip_open && (wait_on_sip || !tg_open);
            wait_on_sip = !wait_on_sip;
            if wait_sip {
                match self.sip_events.pop_timeout(poll) {
                    Recv::Item(event) => self.handle_sip_event(event),
                    Recv::Closed => {
                        sip_open = false;
                        self.queue_closed(Side::Sip);
                    }
                    Recv::Empty => {}
                }
            } else {
                match self.tg_events.pop_timeout(poll) {
                    Recv::Item(event) => self.handle_telegram_event(event),
                    Recv::Closed => {
                        tg_open = false;
                        self.queue_closed(Side::Telegram);
                    }
                    Recv::Empty => {}
                }
            }
        }

        self.finish()
    }

    /// Process one SIP event to completion
    pub fn handle_sip_event(&mut self, event: SipEvent) {
        trace!(%event, "Dispatching SIP event");
        self.dispatch(Side::Sip, event.normalize());
    }

    /// Process one Telegram event to completion
    pub fn handle_telegram_event(&mut self, event: TelegramEvent) {
        trace!(%event, "Dispatching Telegram event");
        self.dispatch(Side::Telegram, event.normalize());
    }

    fn dispatch(&mut self, side: Side, normalized: Normalized) {
        match normalized {
            Normalized::Leg {
                call_id,
                signal: LegSignal::Incoming { remote },
            } => self.handle_incoming(side, call_id, remote),
            Normalized::Leg { call_id, signal } => self.handle_leg_signal(side, call_id, &signal),
            Normalized::Side(status) => self.handle_side_status(side, status),
        }
        self.reap();
    }

    fn handle_incoming(&mut self, side: Side, call_id: CallId, remote: Remote) {
        if self.sessions.find(side, call_id).is_some() || self.sessions.is_retired(side, call_id) {
            warn!(%side, %call_id, "Duplicate incoming call ignored");
            self.stats.events_dropped += 1;
            return;
        }

        let direction = Direction::from_origin(side);
        let active = self.sessions.active_count();
        if let PolicyAction::Reject { reason } = self.policy.evaluate(direction, &remote, active) {
            info!(%side, %call_id, %remote, %reason, active, "Incoming call refused");
            self.refuse(side, call_id, reason);
            return;
        }

        let destination = match self.router.route(direction, &remote) {
            Ok(destination) => destination,
            Err(e) => {
                warn!(%side, %call_id, error = %e, "Incoming call refused");
                self.refuse(side, call_id, TerminationReason::Declined);
                return;
            }
        };

        let session = Session::inbound(side, call_id, remote);
        let id = session.id().clone();
        info!(session = %id, %side, %call_id, remote = %session.remote(), %destination, "Bridging incoming call");
        let commands = match self.sessions.insert(session) {
            Ok(session) => session.accept(destination),
            Err(e) => {
                warn!(session = %id, error = %e, "Could not store session");
                return;
            }
        };
        self.stats.sessions_created += 1;
        self.execute(&id, commands);
    }

    fn refuse(&mut self, side: Side, call_id: CallId, reason: TerminationReason) {
        self.stats.calls_rejected += 1;
        self.sessions.retire(side, call_id);
        let command = Command::Reject { side, call_id, reason };
        if let Err(e) = self.send(&command) {
            self.command_failed(None, &command, &e);
        }
    }

    fn handle_leg_signal(&mut self, side: Side, call_id: CallId, signal: &LegSignal) {
        let id = match self.sessions.find(side, call_id) {
            Some(id) => id.clone(),
            None => match self.correlate(side, call_id) {
                Some(id) => id,
                None => return,
            },
        };

        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        let was_bridged = session.state() == SessionState::Bridged;
        let commands = session.apply(side, signal);
        if !was_bridged && session.state() == SessionState::Bridged {
            self.stats.sessions_bridged += 1;
        }
        self.execute(&id, commands);
    }

    /// Bind an unknown leg id to the oldest session that dialed this side
    fn correlate(&mut self, side: Side, call_id: CallId) -> Option<SessionId> {
        if self.sessions.is_retired(side, call_id) {
            debug!(%side, %call_id, "Event for finished call dropped");
            self.stats.events_dropped += 1;
            return None;
        }
        let Some(id) = self.sessions.oldest_awaiting(side) else {
            warn!(%side, %call_id, "Event for unknown call dropped");
            self.stats.events_dropped += 1;
            return None;
        };
        if let Err(e) = self.sessions.index_leg(&id, side, call_id) {
            warn!(session = %id, error = %e, "Could not bind dialed leg");
            return None;
        }
        let commands = self
            .sessions
            .get_mut(&id)
            .map(|session| session.bind_leg(side, call_id))
            .unwrap_or_default();
        self.execute(&id, commands);
        Some(id)
    }

    fn handle_side_status(&mut self, side: Side, status: SideStatus) {
        match status {
            SideStatus::Up => info!(%side, "Side is up"),
            SideStatus::Pending(state) => debug!(%side, %state, "Side state changed"),
            SideStatus::Down(reason) => {
                warn!(%side, %reason, "Side went down, terminating its legs");
                self.side_lost(side, TerminationReason::NetworkError);
            }
        }
    }

    fn side_lost(&mut self, side: Side, reason: TerminationReason) {
        for id in self.sessions.ids() {
            let commands = match self.sessions.get_mut(&id) {
                Some(session) => session.side_lost(side, reason.clone()),
                None => continue,
            };
            self.execute(&id, commands);
        }
        self.reap();
    }

    /// A client closed its queue: its legs can no longer report anything
    fn queue_closed(&mut self, side: Side) {
        info!(%side, "Event queue closed");
        for id in self.sessions.ids() {
            let commands: Vec<Command> = match self.sessions.get_mut(&id) {
                Some(session) => session.hangup_leg(side).into_iter().collect(),
                None => continue,
            };
            self.execute(&id, commands);
        }
        self.side_lost(side, TerminationReason::Shutdown);
    }

    /// Enforce ringing and teardown deadlines
    pub fn tick(&mut self, now: Instant) {
        let ring_timeout = self.config.ring_timeout;
        let teardown_timeout = self.config.teardown_timeout;
        let mut expired = false;

        for id in self.sessions.ids() {
            let Some(session) = self.sessions.get_mut(&id) else {
                continue;
            };
            match session.expiry(now, ring_timeout, teardown_timeout) {
                Some(Expiry::Ringing) => {
                    warn!(session = %id, state = %session.state(), "Session setup timed out");
                    let commands = session.force_terminate(TerminationReason::Timeout);
                    self.stats.sessions_timed_out += 1;
                    expired = true;
                    self.execute(&id, commands);
                }
                Some(Expiry::Teardown) => {
                    warn!(session = %id, "Teardown timed out, forcing close");
                    session.force_close();
                    self.stats.sessions_timed_out += 1;
                    expired = true;
                }
                None => {}
            }
        }

        if expired {
            self.reap();
        }
    }

    /// Drop closed sessions from the table
    fn reap(&mut self) {
        for session in self.sessions.remove_closed() {
            self.stats.sessions_closed += 1;
            info!(
                session = %session.id(),
                direction = ?session.direction(),
                bridged_for = ?session.bridged_for(),
                reason = ?session.end_reason(),
                "Session closed"
            );
        }
    }

    fn finish(mut self) -> GatewayStats {
        let remaining = self.sessions.len();
        for id in self.sessions.ids() {
            let commands = match self.sessions.get_mut(&id) {
                Some(session) => session.force_terminate(TerminationReason::Shutdown),
                None => continue,
            };
            self.execute(&id, commands);
            if let Some(session) = self.sessions.get_mut(&id) {
                session.force_close();
            }
        }
        self.reap();
        info!(remaining, stats = ?self.stats, "Gateway stopped");
        self.stats
    }

    /// Issue commands in order. A refused dial ends the awaited leg, which can
    /// produce follow-up commands for the same session.
    fn execute(&mut self, id: &SessionId, commands: Vec<Command>) {
        let mut pending: VecDeque<Command> = commands.into();
        while let Some(command) = pending.pop_front() {
            let Err(e) = self.send(&command) else {
                continue;
            };
            self.command_failed(Some(id), &command, &e);
            if let Command::Dial { destination } = &command {
                if let Some(session) = self.sessions.get_mut(id) {
                    let reason = TerminationReason::Other(format!("dial failed: {}", e));
                    pending.extend(session.dial_failed(destination.side(), reason));
                }
            }
        }
    }

    fn command_failed(&mut self, id: Option<&SessionId>, command: &Command, error: &ClientError) {
        if *error == ClientError::Closed {
            debug!(?command, "Client closed, command ignored");
            return;
        }
        self.stats.commands_failed += 1;
        match id {
            Some(id) => warn!(session = %id, ?command, %error, "Command failed"),
            None => warn!(?command, %error, "Command failed"),
        }
    }

    /// Hand a command to its client. A closed queue does not stop commands:
    /// the gateway closes both queues itself on shutdown and still hangs up
    /// its legs. Only the client reporting `Closed` makes a command a no-op.
    fn send(&self, command: &Command) -> ClientResult<()> {
        debug!(?command, "Issuing command");
        match command {
            Command::Answer { side: Side::Sip, call_id } => self.sip.answer(*call_id),
            Command::Answer { side: Side::Telegram, call_id } => self.telegram.accept(*call_id),
            Command::Reject { side: Side::Sip, call_id, reason } => self.sip.reject(*call_id, reason),
            Command::Reject { side: Side::Telegram, call_id, reason } => {
                self.telegram.discard(*call_id, reason)
            }
            Command::Hangup { side: Side::Sip, call_id } => self.sip.hangup(*call_id),
            Command::Hangup { side: Side::Telegram, call_id } => {
                self.telegram.discard(*call_id, &TerminationReason::NormalClearing)
            }
            Command::Dial { destination: Destination::Sip(uri) } => self.sip.dial(uri),
            Command::Dial { destination: Destination::Telegram(peer) } => self.telegram.dial(*peer),
        }
    }
}
