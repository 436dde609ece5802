//! Startup and shutdown sequence.
//!
//! settings -> logging -> SIP client -> Telegram client -> bounded readiness
//! wait -> gateway -> run until the shutdown signal -> graceful shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

use tg2sip_gateway_core::{
    ClientError, Gateway, GatewayError, GatewayStats, Side, SipClient, SipEvent, TelegramClient,
    TelegramEvent,
};
use tg2sip_infra_common::logging::log_welcome;
use tg2sip_infra_common::{setup_logging, EventQueue};

use crate::fault::install_fault_handler;
use crate::settings::{Settings, SettingsError};

/// Process exit status of the launcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    ConfigError,
    TelegramNotReady,
    StartupFailed,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::ConfigError | ExitStatus::TelegramNotReady | ExitStatus::StartupFailed => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Failed to create {side} client: {error:#}")]
    ClientSetup { side: Side, error: anyhow::Error },

    #[error("Failed to start {side} client: {source}")]
    ClientStart { side: Side, source: ClientError },

    #[error("Telegram client not ready after {0:?}")]
    TelegramNotReady(Duration),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Failed to build runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl LaunchError {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            LaunchError::Settings(_) => ExitStatus::ConfigError,
            LaunchError::TelegramNotReady(_) => ExitStatus::TelegramNotReady,
            _ => ExitStatus::StartupFailed,
        }
    }
}

/// Builds the concrete protocol clients on top of the gateway's queues
pub trait ClientFactory {
    fn sip_client(
        &self,
        settings: &Settings,
        events: EventQueue<SipEvent>,
    ) -> anyhow::Result<Arc<dyn SipClient>>;

    fn telegram_client(
        &self,
        settings: &Settings,
        events: EventQueue<TelegramEvent>,
    ) -> anyhow::Result<Arc<dyn TelegramClient>>;
}

pub struct Launcher {
    settings: Settings,
}

impl Launcher {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the gateway until `shutdown` resolves or both clients close
    pub fn run<F>(self, factory: &dyn ClientFactory, shutdown: F) -> Result<GatewayStats, LaunchError>
    where
        F: Future<Output = ()>,
    {
        let logging = self.settings.logging_config()?;
        if let Err(e) = setup_logging(&logging) {
            // Already installed (embedding process or tests)
            debug!(error = %e, "Keeping existing logging subscriber");
        }
        log_welcome(&logging.app_name, env!("CARGO_PKG_VERSION"));

        let sip_events = EventQueue::unbounded();
        let sip = factory
            .sip_client(&self.settings, sip_events.clone())
            .map_err(|error| LaunchError::ClientSetup { side: Side::Sip, error })?;
        sip.start()
            .map_err(|source| LaunchError::ClientStart { side: Side::Sip, source })?;
        info!("SIP client started");

        // The SIP client is running from here on; every early return closes its queue
        let tg_events = EventQueue::unbounded();
        let telegram = match factory.telegram_client(&self.settings, tg_events.clone()) {
            Ok(telegram) => telegram,
            Err(error) => {
                sip_events.close();
                return Err(LaunchError::ClientSetup { side: Side::Telegram, error });
            }
        };
        if let Err(source) = telegram.start() {
            sip_events.close();
            tg_events.close();
            return Err(LaunchError::ClientStart { side: Side::Telegram, source });
        }

        let timeout = self.settings.telegram.readiness_timeout();
        if !telegram.readiness().wait(timeout) {
            error!(critical = true, ?timeout, "Failed to start Telegram client");
            sip_events.close();
            tg_events.close();
            return Err(LaunchError::TelegramNotReady(timeout));
        }
        info!("Telegram client ready");

        let gateway = Gateway::new(sip, telegram, sip_events, tg_events, self.settings.gateway_config())?;
        let handle = gateway.handle();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .thread_name("launcher")
            .build()?;

        runtime.block_on(async move {
            let mut dispatch = tokio::task::spawn_blocking(move || gateway.run());
            let finished = tokio::select! {
                _ = shutdown => None,
                joined = &mut dispatch => Some(joined),
            };
            let joined = match finished {
                Some(joined) => {
                    info!("Both clients closed, gateway stopped");
                    joined
                }
                None => {
                    info!("Performing a graceful shutdown...");
                    handle.shutdown();
                    dispatch.await
                }
            };
            joined.map_err(|_| LaunchError::Gateway(GatewayError::DispatchPanicked))
        })
    }
}

/// Wait for Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal"),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Full process lifecycle: load settings from the environment-selected file,
/// install the fault handler, run until Ctrl+C/SIGTERM.
pub fn launch(factory: &dyn ClientFactory) -> ExitStatus {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            // Logging is configured by the settings that just failed to load
            eprintln!("{}", e);
            return ExitStatus::ConfigError;
        }
    };
    install_fault_handler();

    match Launcher::new(settings).run(factory, shutdown_signal()) {
        Ok(stats) => {
            info!(?stats, "Gateway shut down");
            ExitStatus::Success
        }
        Err(e) => {
            error!(error = %e, "Startup failed");
            e.exit_status()
        }
    }
}
