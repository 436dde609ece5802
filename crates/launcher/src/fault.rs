//! Process-wide fault handler

use std::any::Any;
use std::panic;
use std::thread;
use tracing::error;

/// Log any panic at critical severity, then abort the process.
///
/// A panic on a client or dispatch thread leaves the session table in an
/// unknown state, so the process is not allowed to continue.
pub fn install_fault_handler() {
    panic::set_hook(Box::new(|info| {
        let current = thread::current();
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        error!(
            critical = true,
            thread = current.name().unwrap_or("<unnamed>"),
            %location,
            "Unhandled fault: {}",
            describe_payload(info.payload())
        );
        std::process::abort();
    }));
}

/// Human readable panic payload
pub fn describe_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown fault".to_string()
    }
}
