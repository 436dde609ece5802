//! Session data model and storage

pub mod session;
pub mod table;

pub use session::{Command, Expiry, Leg, LegPhase, Session, SessionSnapshot, SessionState};
pub use table::SessionTable;
