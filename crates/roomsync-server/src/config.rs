//! Hub configuration.
//!
//! Every limit and interval the hub uses lives here so that the binary can
//! expose it on the command line and tests can shrink it.

use std::time::Duration;

/// Operation log limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    /// Oldest operations are dropped beyond this many per room
    pub max_operations_per_room: usize,
    /// The chat projection keeps only this many most recent messages
    pub max_chat_messages: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self { max_operations_per_room: 1000, max_chat_messages: 100 }
    }
}

/// Directory limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// How long an invite stays acceptable
    pub invite_ttl: Duration,
    /// Member cap per room, `None` for unbounded
    pub max_room_members: Option<usize>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self { invite_ttl: Duration::from_secs(30), max_room_members: None }
    }
}

/// Top-level hub configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Operation log limits
    pub history: HistoryLimits,
    /// Directory limits
    pub directory: DirectoryConfig,
    /// Interval between heartbeats on a live connection
    pub heartbeat_interval: Duration,
    /// Interval between expired-invite sweeps
    pub invite_sweep_interval: Duration,
    /// Interval between empty-room sweeps
    pub room_sweep_interval: Duration,
    /// Per-connection outbound buffer (events)
    pub event_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            history: HistoryLimits::default(),
            directory: DirectoryConfig::default(),
            heartbeat_interval: Duration::from_secs(30),
            invite_sweep_interval: Duration::from_secs(10),
            room_sweep_interval: Duration::from_secs(30 * 60),
            event_buffer: 64,
        }
    }
}
