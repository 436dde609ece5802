//! Settings file and environment overrides.
//!
//! The file is INI with one section per component. Every key can be
//! overridden from the environment as `TG2SIP__<SECTION>__<KEY>`, e.g.
//! `TG2SIP__GATEWAY__MAX_SESSIONS=2`.

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use tg2sip_gateway_core::GatewayConfig;
use tg2sip_infra_common::errors::ErrorExt;
use tg2sip_infra_common::logging::parse_log_level;
use tg2sip_infra_common::LoggingConfig;

/// Settings file in the working directory
pub const CONFIG_FILE: &str = "settings.ini";
/// Settings file used when the standard folder is requested
pub const STANDARD_CONFIG_FILE: &str = "/etc/tg2sip/settings.ini";
/// Environment switch selecting [`STANDARD_CONFIG_FILE`]
pub const STANDARD_FOLDER_ENV: &str = "TG2SIP_STANDARD_FOLDER";
/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "TG2SIP";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level (`trace` .. `error`)
    pub level: String,
    /// Comma separated per-target directives, e.g. `tg2sip_gateway_core=debug`
    pub directives: String,
    pub json: bool,
    pub file_info: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directives: String::new(),
            json: false,
            file_info: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SipSettings {
    pub port: u16,
    pub public_address: Option<String>,
    /// Account identity, e.g. `sip:tg2sip@pbx.local`
    pub id_uri: String,
    /// Where Telegram-originated calls are sent; `{peer}` is the caller id
    pub callback_uri: Option<String>,
    pub thread_count: usize,
}

impl Default for SipSettings {
    fn default() -> Self {
        Self {
            port: 5060,
            public_address: None,
            id_uri: "sip:localhost".to_string(),
            callback_uri: None,
            thread_count: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub api_id: i32,
    pub api_hash: String,
    pub database_folder: String,
    /// Telegram user rung for SIP-originated calls
    pub callback_peer: Option<i64>,
    /// How long startup waits for the client to become ready
    pub readiness_timeout_ms: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            api_id: 0,
            api_hash: String::new(),
            database_folder: "tdlib".to_string(),
            callback_peer: None,
            readiness_timeout_ms: 5_000,
        }
    }
}

impl TelegramSettings {
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub max_sessions: usize,
    pub ring_timeout_secs: u64,
    pub teardown_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        let defaults = GatewayConfig::default();
        Self {
            max_sessions: defaults.max_sessions,
            ring_timeout_secs: defaults.ring_timeout.as_secs(),
            teardown_timeout_secs: defaults.teardown_timeout.as_secs(),
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub sip: SipSettings,
    pub telegram: TelegramSettings,
    pub gateway: GatewaySettings,
}

/// Settings path for a given value of [`STANDARD_FOLDER_ENV`]
pub fn config_path_from(standard_folder: Option<&str>) -> PathBuf {
    match standard_folder {
        Some("YES") => PathBuf::from(STANDARD_CONFIG_FILE),
        _ => PathBuf::from(CONFIG_FILE),
    }
}

/// Settings path selected by the process environment
pub fn config_path() -> PathBuf {
    config_path_from(std::env::var(STANDARD_FOLDER_ENV).ok().as_deref())
}

impl Settings {
    /// Load from the path selected by the environment
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from `path` plus environment overrides. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini).required(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.logging_config()?;
        self.gateway_config()
            .validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        if self.telegram.readiness_timeout_ms == 0 {
            return Err(SettingsError::Invalid(
                "telegram.readiness_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn logging_config(&self) -> Result<LoggingConfig> {
        let level = parse_log_level(&self.logging.level)
            .with_context("settings", "logging.level")
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        let mut config = LoggingConfig::new(level, "tg2sip");
        for directive in self.logging.directives.split(',').map(str::trim) {
            if !directive.is_empty() {
                config = config.with_directive(directive);
            }
        }
        if self.logging.json {
            config = config.with_json();
        }
        if self.logging.file_info {
            config = config.with_file_info();
        }
        Ok(config)
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        let mut config = GatewayConfig::default()
            .with_max_sessions(self.gateway.max_sessions)
            .with_ring_timeout(Duration::from_secs(self.gateway.ring_timeout_secs))
            .with_teardown_timeout(Duration::from_secs(self.gateway.teardown_timeout_secs))
            .with_poll_interval(Duration::from_millis(self.gateway.poll_interval_ms));
        if let Some(peer) = self.telegram.callback_peer {
            config = config.with_telegram_callback_peer(peer);
        }
        if let Some(uri) = &self.sip.callback_uri {
            config = config.with_sip_callback_uri(uri.clone());
        }
        config
    }
}
