//! Where the second leg of a session is dialed

use crate::common::errors::{GatewayError, Result};
use crate::common::types::{Destination, Direction, Remote};

/// Placeholder replaced by the caller's Telegram id in the SIP callback URI
pub const PEER_PLACEHOLDER: &str = "{peer}";

/// Trait for implementing routing logic
pub trait RoutingEngine: Send + Sync {
    /// Destination for the dialed leg of a call arriving from `remote`
    fn route(&self, direction: Direction, remote: &Remote) -> Result<Destination>;
}

/// Fixed callback targets per direction.
///
/// SIP-originated calls ring one Telegram user; Telegram-originated calls go
/// to a SIP URI in which `{peer}` is replaced by the caller's Telegram id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticRouter {
    telegram_peer: Option<i64>,
    sip_uri: Option<String>,
}

impl StaticRouter {
    pub fn new(telegram_peer: Option<i64>, sip_uri: Option<String>) -> Self {
        Self { telegram_peer, sip_uri }
    }
}

impl RoutingEngine for StaticRouter {
    fn route(&self, direction: Direction, remote: &Remote) -> Result<Destination> {
        match direction {
            Direction::SipOriginated => self
                .telegram_peer
                .map(Destination::Telegram)
                .ok_or_else(|| GatewayError::NoRoute(remote.to_string())),
            Direction::TelegramOriginated => {
                let template = self
                    .sip_uri
                    .as_deref()
                    .ok_or_else(|| GatewayError::NoRoute(remote.to_string()))?;
                let uri = match remote {
                    Remote::TelegramPeer(peer) => template.replace(PEER_PLACEHOLDER, &peer.to_string()),
                    Remote::SipCaller(_) => template.to_string(),
                };
                Ok(Destination::Sip(uri))
            }
        }
    }
}
