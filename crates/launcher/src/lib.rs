//! # tg2sip launcher
//!
//! Process lifecycle of the gateway. A binary embeds the concrete SIP and
//! Telegram clients through a [`ClientFactory`] and calls [`launch`]:
//!
//! ```ignore
//! fn main() {
//!     let status = tg2sip_launcher::launch(&MyClients);
//!     std::process::exit(status.code());
//! }
//! ```

pub mod fault;
pub mod settings;
pub mod startup;

pub use fault::install_fault_handler;
pub use settings::{Settings, SettingsError};
pub use startup::{launch, shutdown_signal, ClientFactory, ExitStatus, LaunchError, Launcher};
