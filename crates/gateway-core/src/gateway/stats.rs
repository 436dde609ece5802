use serde::{Deserialize, Serialize};

/// Counters kept by the dispatch loop and returned when it stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStats {
    pub sessions_created: u64,
    pub sessions_bridged: u64,
    pub sessions_closed: u64,
    pub sessions_timed_out: u64,
    pub calls_rejected: u64,
    pub events_dropped: u64,
    pub commands_failed: u64,
}
