use std::time::Duration;

use crate::common::errors::{GatewayError, Result};

/// Gateway tuning and routing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Concurrent sessions allowed; further incoming calls are refused as busy
    pub max_sessions: usize,
    /// Longest time a session may stay in setup before it is torn down
    pub ring_timeout: Duration,
    /// Longest time to wait for the surviving leg to report its end
    pub teardown_timeout: Duration,
    /// Blocking wait of the dispatch loop when both queues are idle
    pub poll_interval: Duration,
    /// Telegram user dialed for SIP-originated calls
    pub telegram_callback_peer: Option<i64>,
    /// SIP URI dialed for Telegram-originated calls (`{peer}` is substituted)
    pub sip_callback_uri: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_sessions: 1,
            ring_timeout: Duration::from_secs(60),
            teardown_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(20),
            telegram_callback_peer: None,
            sip_callback_uri: None,
        }
    }
}

impl GatewayConfig {
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    pub fn with_ring_timeout(mut self, timeout: Duration) -> Self {
        self.ring_timeout = timeout;
        self
    }

    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_telegram_callback_peer(mut self, peer_id: i64) -> Self {
        self.telegram_callback_peer = Some(peer_id);
        self
    }

    pub fn with_sip_callback_uri(mut self, uri: impl Into<String>) -> Self {
        self.sip_callback_uri = Some(uri.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_sessions == 0 {
            return Err(GatewayError::ConfigError("max_sessions must be at least 1".into()));
        }
        if self.ring_timeout.is_zero() {
            return Err(GatewayError::ConfigError("ring_timeout must be positive".into()));
        }
        if self.teardown_timeout.is_zero() {
            return Err(GatewayError::ConfigError("teardown_timeout must be positive".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(GatewayError::ConfigError("poll_interval must be positive".into()));
        }
        if let Some(uri) = &self.sip_callback_uri {
            if !uri.starts_with("sip:") && !uri.starts_with("sips:") {
                return Err(GatewayError::ConfigError(format!(
                    "sip_callback_uri must be a SIP URI: {}",
                    uri
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_sessions, 1);
    }

    #[test]
    fn test_invalid_values() {
        assert!(GatewayConfig::default().with_max_sessions(0).validate().is_err());
        assert!(GatewayConfig::default()
            .with_poll_interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(GatewayConfig::default()
            .with_sip_callback_uri("tel:+100")
            .validate()
            .is_err());
    }
}
