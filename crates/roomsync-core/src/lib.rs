//! Roomsync core data model.
//!
//! Pure types shared by the server and its clients: identifiers, the
//! [`Item`] payload sum type, hash-chained [`Operation`]s, live event
//! envelopes and text sanitization. Nothing here touches a clock, a lock or
//! a socket; time comes in through the [`Environment`] trait.
//!
//! # Hash chain
//!
//! Each room's log is a chain: `op[n].parent_hash == op[n-1].hash`. The hash
//! covers a small [`ItemFingerprint`] rather than the full payload so that
//! growing payloads (image bytes, archive handles) don't make hashing
//! expensive. See [`operation`] for the fallback rules.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod event;
pub mod ids;
pub mod item;
pub mod operation;
pub mod sanitize;

pub use env::Environment;
pub use event::{Envelope, EventFrame, EventKind};
pub use ids::{GLOBAL_ROOM_ID, HOST_USER_ID, InviteId, RoomId, UserId};
pub use item::{
    ArchiveRef, ChatMessage, ClipboardItem, ClipboardKind, Item, ItemFingerprint, SingleFile,
    human_file_size,
};
pub use operation::{ChainBreak, ChainHash, HashInput, OpType, Operation, chain_hash, verify_chain};
