//! Identifier newtypes.
//!
//! Ids are opaque strings on the wire (`user_3`, `room_7`, `invite_12`). Two
//! identities are reserved: the privileged [`UserId::host`] that owns open
//! rooms without being a member, and the [`RoomId::global`] room used for
//! clipboard shares made before a user has been placed in a room.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw id string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Raw id string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identity of a registered user.
    UserId
);

string_id!(
    /// Identity of a room (and of its operation log).
    RoomId
);

string_id!(
    /// Identity of a pending invite.
    InviteId
);

/// Raw id of the privileged host identity.
pub const HOST_USER_ID: &str = "host";

/// Raw id of the membership-free global room.
pub const GLOBAL_ROOM_ID: &str = "global";

impl UserId {
    /// The host identity. Rooms it owns are open to anyone.
    pub fn host() -> Self {
        Self::new(HOST_USER_ID)
    }

    /// Whether this is the host identity.
    pub fn is_host(&self) -> bool {
        self.0 == HOST_USER_ID
    }
}

impl RoomId {
    /// The global room. Reads and writes skip the membership check.
    pub fn global() -> Self {
        Self::new(GLOBAL_ROOM_ID)
    }

    /// Whether this is the global room.
    pub fn is_global(&self) -> bool {
        self.0 == GLOBAL_ROOM_ID
    }
}
