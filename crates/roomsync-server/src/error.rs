//! Hub error types.
//!
//! Validation failures ([`DirectoryError`], [`HubError`]) are expected and
//! returned to the caller. Delivery failures ([`DeliveryError`]) only drive
//! registry cleanup; the hub reports them as flags, never as the outcome of
//! a room mutation.

use roomsync_core::{InviteId, RoomId, UserId};
use thiserror::Error;

/// Precondition failures from the room/user/invite directory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Unknown user
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// Unknown room
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    /// Unknown or already consumed invite
    #[error("invite not found: {0}")]
    InviteNotFound(InviteId),

    /// Invite exists but is addressed to someone else
    #[error("invite {0} is not addressed to this user")]
    InviteNotForUser(InviteId),

    /// Invite TTL elapsed
    #[error("invite expired: {0}")]
    InviteExpired(InviteId),

    /// The inviter is no longer in the room the invite targets
    #[error("inviter is no longer in room {0}")]
    InviterLeftRoom(RoomId),

    /// User is not a member of the room
    #[error("user {user} is not a member of room {room}")]
    NotMember {
        /// Acting user
        user: UserId,
        /// Room in question
        room: RoomId,
    },

    /// User is not in any room
    #[error("user {0} is not in any room")]
    NotInRoom(UserId),

    /// User must leave their current room first
    #[error("user {user} is already in room {room}")]
    AlreadyInRoom {
        /// Acting user
        user: UserId,
        /// Room the user is currently in
        room: RoomId,
    },

    /// Caller lacks the right (not approved, not the owner)
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Room reached its member cap
    #[error("room is full: {0}")]
    RoomFull(RoomId),

    /// Name is empty after sanitization
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Name already taken by another user
    #[error("user name already taken: {0}")]
    NameTaken(String),
}

/// Failure to push an event to a live connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// No live connection registered for the user
    #[error("user {0} is not connected")]
    NotConnected(UserId),

    /// The write failed; the connection has been deregistered
    #[error("send to {user} failed: {reason}")]
    SendFailed {
        /// Recipient
        user: UserId,
        /// Sink-provided reason
        reason: String,
    },

    /// The envelope could not be serialized
    #[error("event encoding failed: {0}")]
    Encode(String),
}

impl DeliveryError {
    /// Whether the recipient may be reachable again later.
    ///
    /// Transient failures mean the client should catch up via the
    /// incremental diff query once it reconnects. Encoding failures are
    /// not transient: retrying the same payload fails the same way.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NotConnected(_) | Self::SendFailed { .. } => true,
            Self::Encode(_) => false,
        }
    }

    /// Recipient the failure concerns, if any.
    pub fn user(&self) -> Option<&UserId> {
        match self {
            Self::NotConnected(user) | Self::SendFailed { user, .. } => Some(user),
            Self::Encode(_) => None,
        }
    }
}

/// Errors returned by [`crate::Hub`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Directory validation failed
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Direct delivery failed where delivery is the whole point
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Chat message is empty after sanitization
    #[error("message is empty")]
    EmptyMessage,

    /// No item with this id in the room's log
    #[error("item {item} not found in room {room}")]
    ItemNotFound {
        /// Room searched
        room: RoomId,
        /// Missing item id
        item: String,
    },

    /// Item exists but is not a clipboard capture
    #[error("item {0} is not a clipboard item")]
    NotClipboard(String),
}

impl HubError {
    /// Whether this is an expected validation failure (as opposed to a
    /// delivery problem).
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Delivery(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_transience() {
        assert!(DeliveryError::NotConnected("user_1".into()).is_transient());
        assert!(
            DeliveryError::SendFailed { user: "user_1".into(), reason: "closed".into() }
                .is_transient()
        );
        assert!(!DeliveryError::Encode("bad".into()).is_transient());
    }

    #[test]
    fn directory_errors_convert() {
        let err: HubError = DirectoryError::RoomNotFound("room_9".into()).into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "room not found: room_9");
    }
}
