//! Random interleavings of both sides' events never let two live sessions
//! share a leg, and never hang up a leg twice

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tg2sip_gateway_core::testing::{ClientCommand, RecordingSipClient, RecordingTelegramClient};
use tg2sip_gateway_core::{
    CallId, Gateway, GatewayConfig, SessionState, Side, SipCallState, SipClient, SipEvent,
    TelegramCallState, TelegramClient, TelegramEvent, TerminationReason,
};
use tg2sip_infra_common::EventQueue;

#[derive(Debug, Clone)]
enum Op {
    Sip(SipEvent),
    Telegram(TelegramEvent),
}

fn sip_id() -> impl Strategy<Value = CallId> {
    (1u64..5).prop_map(CallId)
}

fn tg_id() -> impl Strategy<Value = CallId> {
    (10u64..14).prop_map(CallId)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        sip_id().prop_map(|call_id| Op::Sip(SipEvent::IncomingCall {
            call_id,
            caller_id: "100".into(),
        })),
        (tg_id(), 500i64..503).prop_map(|(call_id, peer_id)| {
            Op::Telegram(TelegramEvent::IncomingCall { call_id, peer_id })
        }),
        (sip_id(), prop_oneof![Just(SipCallState::Calling), Just(SipCallState::Confirmed)])
            .prop_map(|(call_id, state)| Op::Sip(SipEvent::CallStateChanged { call_id, state })),
        sip_id().prop_map(|call_id| Op::Sip(SipEvent::CallTerminated {
            call_id,
            reason: TerminationReason::NormalClearing,
        })),
        (tg_id(), prop_oneof![Just(TelegramCallState::Pending), Just(TelegramCallState::Ready)])
            .prop_map(|(call_id, state)| {
                Op::Telegram(TelegramEvent::CallStateChanged { call_id, state })
            }),
        tg_id().prop_map(|call_id| Op::Telegram(TelegramEvent::CallDiscarded {
            call_id,
            reason: TerminationReason::NormalClearing,
        })),
    ]
}

fn setup() -> (Gateway, Arc<RecordingSipClient>, Arc<RecordingTelegramClient>) {
    let sip_events = EventQueue::unbounded();
    let tg_events = EventQueue::unbounded();
    let sip = Arc::new(RecordingSipClient::new(sip_events.clone()));
    let tg = Arc::new(RecordingTelegramClient::new(tg_events.clone()));
    sip.start().unwrap();
    tg.start().unwrap();
    let config = GatewayConfig::default()
        .with_max_sessions(2)
        .with_telegram_callback_peer(42)
        .with_sip_callback_uri("sip:{peer}@pbx.local");
    let gateway = Gateway::new(sip.clone(), tg.clone(), sip_events, tg_events, config).unwrap();
    (gateway, sip, tg)
}

fn hangups(commands: &[ClientCommand]) -> HashMap<CallId, usize> {
    let mut counts = HashMap::new();
    for command in commands {
        match command {
            ClientCommand::Hangup(call_id)
            | ClientCommand::Discard(call_id, TerminationReason::NormalClearing) => {
                *counts.entry(*call_id).or_insert(0) += 1;
            }
            _ => {}
        }
    }
    counts
}

proptest! {
    #[test]
    fn test_legs_are_never_shared_or_hung_up_twice(ops in prop::collection::vec(op(), 1..40)) {
        let (mut gateway, sip, tg) = setup();

        for op in ops {
            match op {
                Op::Sip(event) => gateway.handle_sip_event(event),
                Op::Telegram(event) => gateway.handle_telegram_event(event),
            }

            let mut legs = HashSet::new();
            for session in gateway.sessions() {
                if session.state == SessionState::Closed {
                    continue;
                }
                let owned = [(Side::Sip, session.sip_leg), (Side::Telegram, session.tg_leg)];
                for (side, leg) in owned {
                    if let Some(call_id) = leg {
                        prop_assert!(legs.insert((side, call_id)), "{side} leg {call_id} shared");
                    }
                }
            }

            for (call_id, count) in hangups(&sip.commands()) {
                prop_assert!(count <= 1, "SIP leg {call_id} hung up {count} times");
            }
            for (call_id, count) in hangups(&tg.commands()) {
                prop_assert!(count <= 1, "Telegram leg {call_id} hung up {count} times");
            }
        }
    }
}
