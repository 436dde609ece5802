//! Session storage with a per-leg index.
//!
//! Owned and mutated only by the gateway dispatch thread, so no locking.
//! Insertion order is kept so that dialed legs are correlated with the oldest
//! waiting session first.

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use crate::common::errors::{GatewayError, Result};
use crate::common::types::{CallId, SessionId, Side};
use crate::session::session::{Session, SessionSnapshot};

/// How many ended leg ids are remembered per table
const RETIRED_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: IndexMap<SessionId, Session>,
    by_leg: HashMap<(Side, CallId), SessionId>,
    /// Legs that belonged to removed sessions or refused calls. Late events
    /// for them must be dropped, never bound to another session.
    retired: HashSet<(Side, CallId)>,
    retired_order: VecDeque<(Side, CallId)>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new session and index its known legs
    pub fn insert(&mut self, session: Session) -> Result<&mut Session> {
        for side in [Side::Sip, Side::Telegram] {
            if let Some(call_id) = session.leg(side).call_id {
                if self.by_leg.contains_key(&(side, call_id)) {
                    return Err(GatewayError::DuplicateLeg { side, call_id });
                }
            }
        }
        for side in [Side::Sip, Side::Telegram] {
            if let Some(call_id) = session.leg(side).call_id {
                self.by_leg.insert((side, call_id), session.id().clone());
            }
        }
        let id = session.id().clone();
        debug!(session = %id, direction = ?session.direction(), "Session created");
        Ok(self.sessions.entry(id).or_insert(session))
    }

    pub fn find(&self, side: Side, call_id: CallId) -> Option<&SessionId> {
        self.by_leg.get(&(side, call_id))
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Index a dialed leg under its session
    pub fn index_leg(&mut self, id: &SessionId, side: Side, call_id: CallId) -> Result<()> {
        if self.by_leg.contains_key(&(side, call_id)) {
            return Err(GatewayError::DuplicateLeg { side, call_id });
        }
        self.by_leg.insert((side, call_id), id.clone());
        Ok(())
    }

    /// Oldest session that dialed `side` and has not learned the leg id yet
    pub fn oldest_awaiting(&self, side: Side) -> Option<SessionId> {
        self.sessions
            .values()
            .find(|session| session.awaits_leg(side))
            .map(|session| session.id().clone())
    }

    pub fn is_retired(&self, side: Side, call_id: CallId) -> bool {
        self.retired.contains(&(side, call_id))
    }

    /// Remember a leg id that must never be correlated again
    pub fn retire(&mut self, side: Side, call_id: CallId) {
        if !self.retired.insert((side, call_id)) {
            return;
        }
        self.retired_order.push_back((side, call_id));
        while self.retired_order.len() > RETIRED_CAPACITY {
            if let Some(old) = self.retired_order.pop_front() {
                self.retired.remove(&old);
            }
        }
    }

    /// Number of sessions that are not closed
    pub fn active_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|session| !session.state().is_terminal())
            .count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().cloned().collect()
    }

    /// Remove every closed session, retiring its legs
    pub fn remove_closed(&mut self) -> Vec<Session> {
        let closed: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|session| session.state().is_terminal())
            .map(|session| session.id().clone())
            .collect();

        let mut removed = Vec::with_capacity(closed.len());
        for id in closed {
            if let Some(session) = self.sessions.shift_remove(&id) {
                for side in [Side::Sip, Side::Telegram] {
                    if let Some(call_id) = session.leg(side).call_id {
                        self.by_leg.remove(&(side, call_id));
                        self.retire(side, call_id);
                    }
                }
                removed.push(session);
            }
        }
        removed
    }

    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        self.sessions.values().map(Session::snapshot).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{Destination, Remote, TerminationReason};
    use crate::events::LegSignal;

    fn sip_session(call_id: u64) -> Session {
        Session::inbound(Side::Sip, CallId(call_id), Remote::SipCaller("100".into()))
    }

    #[test]
    fn test_duplicate_leg_rejected() {
        let mut table = SessionTable::new();
        table.insert(sip_session(1)).unwrap();
        let err = table.insert(sip_session(1)).unwrap_err();
        assert_eq!(err, GatewayError::DuplicateLeg { side: Side::Sip, call_id: CallId(1) });
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_same_numeric_id_on_both_sides() {
        let mut table = SessionTable::new();
        table.insert(sip_session(1)).unwrap();
        table
            .insert(Session::inbound(Side::Telegram, CallId(1), Remote::TelegramPeer(5)))
            .unwrap();
        assert_eq!(table.active_count(), 2);
    }

    #[test]
    fn test_oldest_awaiting_in_insertion_order() {
        let mut table = SessionTable::new();
        let first = table.insert(sip_session(1)).unwrap();
        first.accept(Destination::Telegram(42));
        let first_id = first.id().clone();
        let second = table.insert(sip_session(2)).unwrap();
        second.accept(Destination::Telegram(43));

        assert_eq!(table.oldest_awaiting(Side::Telegram), Some(first_id.clone()));
        table.get_mut(&first_id).unwrap().bind_leg(Side::Telegram, CallId(70));
        assert_ne!(table.oldest_awaiting(Side::Telegram), Some(first_id));
        assert_eq!(table.oldest_awaiting(Side::Sip), None);
    }

    #[test]
    fn test_remove_closed_retires_legs() {
        let mut table = SessionTable::new();
        let session = table.insert(sip_session(1)).unwrap();
        session.accept(Destination::Telegram(42));
        session.bind_leg(Side::Telegram, CallId(7));
        let id = session.id().clone();
        table.index_leg(&id, Side::Telegram, CallId(7)).unwrap();

        let terminated = LegSignal::Terminated { reason: TerminationReason::NormalClearing };
        for (side, call_id) in [(Side::Sip, CallId(1)), (Side::Telegram, CallId(7))] {
            let id = table.find(side, call_id).cloned().unwrap();
            table.get_mut(&id).unwrap().apply(side, &terminated);
        }

        let removed = table.remove_closed();
        assert_eq!(removed.len(), 1);
        assert!(table.is_empty());
        assert!(table.find(Side::Sip, CallId(1)).is_none());
        assert!(table.is_retired(Side::Telegram, CallId(7)));
    }

    #[test]
    fn test_retired_set_is_bounded() {
        let mut table = SessionTable::new();
        for id in 0..(RETIRED_CAPACITY as u64 + 10) {
            table.retire(Side::Sip, CallId(id));
        }
        assert!(!table.is_retired(Side::Sip, CallId(0)));
        assert!(table.is_retired(Side::Sip, CallId(RETIRED_CAPACITY as u64 + 9)));
    }
}
