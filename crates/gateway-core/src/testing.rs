//! Recording client implementations.
//!
//! They stand in for the SIP stack and the Telegram client: commands are
//! recorded instead of being sent to a network, and events are injected with
//! `emit` exactly as a client's internal thread would push them.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tg2sip_infra_common::{EventQueue, QueueClosed};

use crate::client::{ClientError, ClientResult, Readiness, SipClient, TelegramClient};
use crate::common::types::{CallId, TerminationReason};
use crate::events::{SipEvent, TelegramEvent};

/// A command as observed by a recording client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Answer(CallId),
    Reject(CallId, TerminationReason),
    Hangup(CallId),
    Discard(CallId, TerminationReason),
    DialSip(String),
    DialTelegram(i64),
}

#[derive(Default)]
struct Recorder {
    commands: Mutex<Vec<ClientCommand>>,
    changed: Condvar,
}

impl Recorder {
    fn record(&self, command: ClientCommand) {
        self.commands.lock().push(command);
        self.changed.notify_all();
    }

    fn snapshot(&self) -> Vec<ClientCommand> {
        self.commands.lock().clone()
    }

    fn take(&self) -> Vec<ClientCommand> {
        std::mem::take(&mut *self.commands.lock())
    }

    fn wait_for(&self, count: usize, timeout: Duration) -> Vec<ClientCommand> {
        let deadline = Instant::now() + timeout;
        let mut commands = self.commands.lock();
        while commands.len() < count {
            if self.changed.wait_until(&mut commands, deadline).timed_out() {
                break;
            }
        }
        commands.clone()
    }
}

struct Lifecycle {
    started: AtomicBool,
    /// Set by `close`; the gateway closing the queue does not shut the client
    closed: AtomicBool,
    dial_error: Mutex<Option<ClientError>>,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            dial_error: Mutex::new(None),
        }
    }

    fn start(&self) -> ClientResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyStarted);
        }
        Ok(())
    }

    fn close<T>(&self, events: &EventQueue<T>) {
        self.closed.store(true, Ordering::SeqCst);
        events.close();
    }

    fn check(&self) -> ClientResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        if !self.started.load(Ordering::SeqCst) {
            return Err(ClientError::NotStarted);
        }
        Ok(())
    }

    fn dial_error(&self) -> ClientResult<()> {
        match self.dial_error.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// SIP client that records every command
pub struct RecordingSipClient {
    events: EventQueue<SipEvent>,
    lifecycle: Lifecycle,
    recorder: Recorder,
}

impl RecordingSipClient {
    pub fn new(events: EventQueue<SipEvent>) -> Self {
        Self {
            events,
            lifecycle: Lifecycle::new(),
            recorder: Recorder::default(),
        }
    }

    /// Push an event as the SIP stack thread would
    pub fn emit(&self, event: SipEvent) -> Result<(), QueueClosed<SipEvent>> {
        self.events.push(event)
    }

    pub fn commands(&self) -> Vec<ClientCommand> {
        self.recorder.snapshot()
    }

    /// Return and clear the recorded commands
    pub fn take_commands(&self) -> Vec<ClientCommand> {
        self.recorder.take()
    }

    /// Wait until at least `count` commands were recorded (or the timeout)
    pub fn wait_for_commands(&self, count: usize, timeout: Duration) -> Vec<ClientCommand> {
        self.recorder.wait_for(count, timeout)
    }

    /// Make every following `dial` fail synchronously
    pub fn fail_dials_with(&self, error: ClientError) {
        *self.lifecycle.dial_error.lock() = Some(error);
    }

    /// Simulate the client shutting down: commands fail with `Closed` and
    /// the event queue is closed
    pub fn close(&self) {
        self.lifecycle.close(&self.events);
    }
}

impl SipClient for RecordingSipClient {
    fn start(&self) -> ClientResult<()> {
        self.lifecycle.start()
    }

    fn answer(&self, call_id: CallId) -> ClientResult<()> {
        self.lifecycle.check()?;
        self.recorder.record(ClientCommand::Answer(call_id));
        Ok(())
    }

    fn reject(&self, call_id: CallId, reason: &TerminationReason) -> ClientResult<()> {
        self.lifecycle.check()?;
        self.recorder.record(ClientCommand::Reject(call_id, reason.clone()));
        Ok(())
    }

    fn hangup(&self, call_id: CallId) -> ClientResult<()> {
        self.lifecycle.check()?;
        self.recorder.record(ClientCommand::Hangup(call_id));
        Ok(())
    }

    fn dial(&self, destination: &str) -> ClientResult<()> {
        self.lifecycle.check()?;
        self.lifecycle.dial_error()?;
        self.recorder.record(ClientCommand::DialSip(destination.to_string()));
        Ok(())
    }
}

/// Telegram client that records every command
pub struct RecordingTelegramClient {
    events: EventQueue<TelegramEvent>,
    lifecycle: Lifecycle,
    recorder: Recorder,
    readiness: Readiness,
    ready_on_start: bool,
}

impl RecordingTelegramClient {
    /// Client whose readiness is resolved manually (or never)
    pub fn new(events: EventQueue<TelegramEvent>) -> Self {
        Self {
            events,
            lifecycle: Lifecycle::new(),
            recorder: Recorder::default(),
            readiness: Readiness::new(),
            ready_on_start: false,
        }
    }

    /// Resolve readiness as soon as `start` is called
    pub fn ready_on_start(mut self) -> Self {
        self.ready_on_start = true;
        self
    }

    /// Resolve readiness from the "client thread"
    pub fn resolve_ready(&self, ready: bool) {
        self.readiness.resolve(ready);
    }

    /// Push an event as the Telegram client thread would
    pub fn emit(&self, event: TelegramEvent) -> Result<(), QueueClosed<TelegramEvent>> {
        self.events.push(event)
    }

    pub fn commands(&self) -> Vec<ClientCommand> {
        self.recorder.snapshot()
    }

    /// Return and clear the recorded commands
    pub fn take_commands(&self) -> Vec<ClientCommand> {
        self.recorder.take()
    }

    /// Wait until at least `count` commands were recorded (or the timeout)
    pub fn wait_for_commands(&self, count: usize, timeout: Duration) -> Vec<ClientCommand> {
        self.recorder.wait_for(count, timeout)
    }

    /// Make every following `dial` fail synchronously
    pub fn fail_dials_with(&self, error: ClientError) {
        *self.lifecycle.dial_error.lock() = Some(error);
    }

    /// Simulate the client shutting down: commands fail with `Closed` and
    /// the event queue is closed
    pub fn close(&self) {
        self.lifecycle.close(&self.events);
    }
}

impl TelegramClient for RecordingTelegramClient {
    fn start(&self) -> ClientResult<()> {
        self.lifecycle.start()?;
        if self.ready_on_start {
            self.readiness.resolve(true);
        }
        Ok(())
    }

    fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    fn accept(&self, call_id: CallId) -> ClientResult<()> {
        self.lifecycle.check()?;
        self.recorder.record(ClientCommand::Answer(call_id));
        Ok(())
    }

    fn discard(&self, call_id: CallId, reason: &TerminationReason) -> ClientResult<()> {
        self.lifecycle.check()?;
        self.recorder.record(ClientCommand::Discard(call_id, reason.clone()));
        Ok(())
    }

    fn dial(&self, peer_id: i64) -> ClientResult<()> {
        self.lifecycle.check()?;
        self.lifecycle.dial_error()?;
        self.recorder.record(ClientCommand::DialTelegram(peer_id));
        Ok(())
    }
}
