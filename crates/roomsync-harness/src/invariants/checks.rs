//! Standard invariant checks.

use std::collections::HashMap;

use roomsync_core::{RoomId, UserId, verify_chain};

use super::{Invariant, InvariantKind, InvariantResult, SystemSnapshot, Violation};

/// `user.room_id == Some(r)` iff the user is in `r.member_ids`, for exactly
/// one room. Member lists have no duplicates.
pub struct MembershipConsistency;

impl Invariant for MembershipConsistency {
    fn kind(&self) -> InvariantKind {
        InvariantKind::MembershipConsistency
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let violation = |message: String| Violation { invariant: self.kind(), message };

        let mut seen_in: HashMap<&UserId, &RoomId> = HashMap::new();
        for room in &state.directory.rooms {
            for (i, member) in room.member_ids.iter().enumerate() {
                if room.member_ids[..i].contains(member) {
                    return Err(violation(format!("room {}: duplicate member {member}", room.id)));
                }
                if let Some(other) = seen_in.insert(member, &room.id) {
                    return Err(violation(format!(
                        "user {member} is a member of both {other} and {}",
                        room.id
                    )));
                }
            }
        }

        for user in &state.directory.users {
            let listed = seen_in.get(&user.id).copied();
            if user.room_id.as_ref() != listed {
                return Err(violation(format!(
                    "user {}: room_id {:?} but member of {:?}",
                    user.id, user.room_id, listed
                )));
            }
        }

        let known: Vec<&UserId> = state.directory.users.iter().map(|u| &u.id).collect();
        if let Some(stray) = seen_in.keys().find(|id| !known.contains(*id)) {
            return Err(violation(format!("unknown user {stray} listed as a member")));
        }

        Ok(())
    }
}

/// Adjacent retained operations are hash-linked and ids increase by one.
pub struct ChainIntegrity;

impl Invariant for ChainIntegrity {
    fn kind(&self) -> InvariantKind {
        InvariantKind::ChainIntegrity
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (room, ops) in &state.logs {
            verify_chain(ops).map_err(|e| Violation {
                invariant: self.kind(),
                message: format!("room {room}: {e}"),
            })?;

            if let Some(op) = ops.first().filter(|op| op.id == 1 && !op.parent_hash.is_empty()) {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!("room {room}: head op {} names a parent", op.id),
                });
            }
        }
        Ok(())
    }
}

/// No log is longer than the configured cap.
pub struct LogBound;

impl Invariant for LogBound {
    fn kind(&self) -> InvariantKind {
        InvariantKind::LogBound
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let cap = state.max_operations_per_room.max(1);
        match state.logs.iter().find(|(_, ops)| ops.len() > cap) {
            Some((room, ops)) => Err(Violation {
                invariant: self.kind(),
                message: format!("room {room}: {} operations, cap {cap}", ops.len()),
            }),
            None => Ok(()),
        }
    }
}

/// Every room is owned by the host or by a registered user.
pub struct OwnerKnown;

impl Invariant for OwnerKnown {
    fn kind(&self) -> InvariantKind {
        InvariantKind::OwnerKnown
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.directory.rooms {
            let known = room.owner_id.is_host()
                || state.directory.users.iter().any(|u| u.id == room.owner_id);
            if !known {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!("room {}: unknown owner {}", room.id, room.owner_id),
                });
            }
        }
        Ok(())
    }
}
