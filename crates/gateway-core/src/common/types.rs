//! Common types used throughout the gateway core

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one call leg, assigned by the owning client.
///
/// Unique for the lifetime of the leg on its side and never reused. The same
/// numeric value may exist on both sides at once, so a leg is only fully
/// identified together with its [`Side`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub u64);

impl From<u64> for CallId {
    fn from(value: u64) -> Self {
        CallId(value)
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which network a leg lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Sip,
    Telegram,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Sip => Side::Telegram,
            Side::Telegram => Side::Sip,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Sip => "sip",
            Side::Telegram => "telegram",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identifier for a bridged session, used for log correlation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(format!("session-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the call that created a session came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    SipOriginated,
    TelegramOriginated,
}

impl Direction {
    pub fn from_origin(side: Side) -> Self {
        match side {
            Side::Sip => Direction::SipOriginated,
            Side::Telegram => Direction::TelegramOriginated,
        }
    }

    /// Side of the incoming (answered) leg
    pub fn origin(self) -> Side {
        match self {
            Direction::SipOriginated => Side::Sip,
            Direction::TelegramOriginated => Side::Telegram,
        }
    }

    /// Side of the dialed leg
    pub fn target(self) -> Side {
        self.origin().opposite()
    }
}

/// The remote party of an incoming leg
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Remote {
    /// SIP caller id (URI or number as presented)
    SipCaller(String),
    /// Telegram user id
    TelegramPeer(i64),
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remote::SipCaller(caller) => write!(f, "sip:{}", caller),
            Remote::TelegramPeer(peer) => write!(f, "tg:{}", peer),
        }
    }
}

/// Target of an outbound dial
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Destination {
    /// SIP URI
    Sip(String),
    /// Telegram user id
    Telegram(i64),
}

impl Destination {
    pub fn side(&self) -> Side {
        match self {
            Destination::Sip(_) => Side::Sip,
            Destination::Telegram(_) => Side::Telegram,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Sip(uri) => f.write_str(uri),
            Destination::Telegram(peer) => write!(f, "tg:{}", peer),
        }
    }
}

/// Why a leg ended or was refused
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationReason {
    NormalClearing,
    Busy,
    Declined,
    NoAnswer,
    Timeout,
    NetworkError,
    Shutdown,
    Other(String),
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::NormalClearing => f.write_str("normal clearing"),
            TerminationReason::Busy => f.write_str("busy"),
            TerminationReason::Declined => f.write_str("declined"),
            TerminationReason::NoAnswer => f.write_str("no answer"),
            TerminationReason::Timeout => f.write_str("timeout"),
            TerminationReason::NetworkError => f.write_str("network error"),
            TerminationReason::Shutdown => f.write_str("shutdown"),
            TerminationReason::Other(reason) => f.write_str(reason),
        }
    }
}
