//! The dispatch loop running on its own thread, fed by client threads

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tg2sip_gateway_core::testing::{ClientCommand, RecordingSipClient, RecordingTelegramClient};
use tg2sip_gateway_core::{
    CallId, Gateway, GatewayConfig, SipClient, SipEvent, TelegramCallState, TelegramClient,
    TelegramEvent, TerminationReason,
};
use tg2sip_infra_common::EventQueue;

const WAIT: Duration = Duration::from_secs(5);

fn setup() -> (Gateway, Arc<RecordingSipClient>, Arc<RecordingTelegramClient>) {
    let sip_events = EventQueue::unbounded();
    let tg_events = EventQueue::unbounded();
    let sip = Arc::new(RecordingSipClient::new(sip_events.clone()));
    let tg = Arc::new(RecordingTelegramClient::new(tg_events.clone()).ready_on_start());
    sip.start().unwrap();
    tg.start().unwrap();
    let config = GatewayConfig::default()
        .with_telegram_callback_peer(42)
        .with_poll_interval(Duration::from_millis(5));
    let gateway = Gateway::new(sip.clone(), tg.clone(), sip_events, tg_events, config).unwrap();
    (gateway, sip, tg)
}

#[test]
fn test_bridge_and_hangup_across_threads() {
    let (gateway, sip, tg) = setup();
    let running = gateway.spawn().unwrap();

    let sip_thread = {
        let sip = sip.clone();
        thread::spawn(move || {
            sip.emit(SipEvent::IncomingCall {
                call_id: CallId(1),
                caller_id: "100".into(),
            })
            .unwrap();
        })
    };
    sip_thread.join().unwrap();

    assert_eq!(
        tg.wait_for_commands(1, WAIT),
        vec![ClientCommand::DialTelegram(42)]
    );
    assert_eq!(sip.wait_for_commands(1, WAIT), vec![ClientCommand::Answer(CallId(1))]);

    tg.emit(TelegramEvent::CallStateChanged {
        call_id: CallId(7),
        state: TelegramCallState::Ready,
    })
    .unwrap();
    sip.emit(SipEvent::CallTerminated {
        call_id: CallId(1),
        reason: TerminationReason::NormalClearing,
    })
    .unwrap();

    assert_eq!(
        tg.wait_for_commands(2, WAIT).last(),
        Some(&ClientCommand::Discard(CallId(7), TerminationReason::NormalClearing))
    );
    tg.emit(TelegramEvent::CallDiscarded {
        call_id: CallId(7),
        reason: TerminationReason::NormalClearing,
    })
    .unwrap();

    let stats = running.shutdown().unwrap();
    assert_eq!(stats.sessions_created, 1);
    assert_eq!(stats.sessions_bridged, 1);
    assert_eq!(stats.sessions_closed, 1);
}

#[test]
fn test_events_queued_before_shutdown_are_drained() {
    let (gateway, sip, tg) = setup();
    let handle = gateway.handle();

    sip.emit(SipEvent::IncomingCall {
        call_id: CallId(1),
        caller_id: "100".into(),
    })
    .unwrap();
    handle.shutdown();
    assert!(sip
        .emit(SipEvent::IncomingCall {
            call_id: CallId(2),
            caller_id: "200".into(),
        })
        .is_err());

    let stats = gateway.run();
    assert_eq!(stats.sessions_created, 1);
    assert_eq!(stats.sessions_closed, 1);
    assert_eq!(stats.commands_failed, 0);
    // The drained call was bridged as usual, then hung up by the shutdown
    assert_eq!(
        sip.commands(),
        vec![ClientCommand::Answer(CallId(1)), ClientCommand::Hangup(CallId(1))]
    );
    assert_eq!(tg.commands(), vec![ClientCommand::DialTelegram(42)]);
}

#[test]
fn test_shutdown_hangs_up_both_legs_of_bridged_session() {
    let (mut gateway, sip, tg) = setup();
    gateway.handle_sip_event(SipEvent::IncomingCall {
        call_id: CallId(1),
        caller_id: "100".into(),
    });
    gateway.handle_telegram_event(TelegramEvent::CallStateChanged {
        call_id: CallId(7),
        state: TelegramCallState::Ready,
    });
    assert_eq!(gateway.stats().sessions_bridged, 1);

    gateway.handle().shutdown();
    let stats = gateway.run();

    assert_eq!(
        sip.commands(),
        vec![ClientCommand::Answer(CallId(1)), ClientCommand::Hangup(CallId(1))]
    );
    assert_eq!(
        tg.commands(),
        vec![
            ClientCommand::DialTelegram(42),
            ClientCommand::Discard(CallId(7), TerminationReason::NormalClearing),
        ]
    );
    assert_eq!(stats.sessions_closed, 1);
    assert_eq!(stats.commands_failed, 0);
}

#[test]
fn test_shutdown_skips_clients_that_already_closed() {
    let (mut gateway, sip, tg) = setup();
    gateway.handle_sip_event(SipEvent::IncomingCall {
        call_id: CallId(1),
        caller_id: "100".into(),
    });
    gateway.handle_telegram_event(TelegramEvent::CallStateChanged {
        call_id: CallId(7),
        state: TelegramCallState::Ready,
    });
    tg.close();

    gateway.handle().shutdown();
    let stats = gateway.run();

    assert_eq!(sip.commands().last(), Some(&ClientCommand::Hangup(CallId(1))));
    assert_eq!(tg.commands(), vec![ClientCommand::DialTelegram(42)]);
    assert_eq!(stats.sessions_closed, 1);
    assert_eq!(stats.commands_failed, 0);
}

#[test]
fn test_shutdown_with_bridged_session_closes_it() {
    let (gateway, sip, tg) = setup();
    let running = gateway.spawn().unwrap();

    sip.emit(SipEvent::IncomingCall {
        call_id: CallId(1),
        caller_id: "100".into(),
    })
    .unwrap();
    tg.wait_for_commands(1, WAIT);
    tg.emit(TelegramEvent::CallStateChanged {
        call_id: CallId(7),
        state: TelegramCallState::Ready,
    })
    .unwrap();

    let handle = running.handle();
    thread::sleep(Duration::from_millis(50));
    handle.shutdown();
    let stats = running.join().unwrap();

    assert_eq!(stats.sessions_bridged, 1);
    assert_eq!(stats.sessions_closed, 1);
    assert_eq!(stats.commands_failed, 0);
    assert_eq!(sip.commands().last(), Some(&ClientCommand::Hangup(CallId(1))));
    assert_eq!(
        tg.commands().last(),
        Some(&ClientCommand::Discard(CallId(7), TerminationReason::NormalClearing))
    );
}
