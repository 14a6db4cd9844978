//! Observable state captured for invariant checks.

use roomsync_core::{Environment, Operation, RoomId};
use roomsync_server::{DirectorySnapshot, Hub};

/// Directory and logs at one point in time.
///
/// The two halves are captured one after the other; run checks only while
/// no other task is mutating the hub.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Users, rooms and invites
    pub directory: DirectorySnapshot,
    /// Every room log, sorted by room id
    pub logs: Vec<(RoomId, Vec<Operation>)>,
    /// Per-room log cap in effect
    pub max_operations_per_room: usize,
}

impl SystemSnapshot {
    /// Capture the state of `hub`.
    pub fn capture<E: Environment>(hub: &Hub<E>) -> Self {
        let mut logs = hub.history().snapshot();
        logs.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            directory: hub.directory().snapshot(),
            logs,
            max_operations_per_room: hub.history().limits().max_operations_per_room,
        }
    }
}
