//! Roomsync server.
//!
//! Shared rooms where users exchange chat messages and clipboard captures.
//! Three components do the work, each behind its own locks:
//!
//! - [`Directory`]: users, rooms, invites and the membership state machine
//! - [`HistoryPool`]: per-room hash-chained operation logs
//! - [`EventDistributor`]: live connections and event fan-out
//!
//! [`Hub`] wires them together. The directory is Sans-IO in the same sense as
//! the rest of the crate: transitions return [`DirectoryAction`]s and the hub
//! executes them after the directory lock is released. Transports (HTTP,
//! SSE, sockets) sit outside this crate and talk to the hub through
//! [`EventSink`] and the hub's methods.
//!
//! [`SystemEnv`] supplies wall-clock time and Tokio sleeping in production.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
pub mod config;
pub mod directory;
pub mod distributor;
mod error;
pub mod history;
mod hub;
mod maintenance;
mod sync;
mod system_env;

pub use archive::{ArchiveError, Archiver};
pub use config::{DirectoryConfig, HistoryLimits, HubConfig};
pub use directory::{
    Directory, DirectoryAction, DirectorySnapshot, JoinRequest, LeaveOutcome, PendingInvite, Room,
    RoomAccess, Transition, User,
};
pub use distributor::{
    ChannelSink, ConnectionHandle, DeliveryReport, EventDistributor, EventSink, SinkError,
};
pub use error::{DeliveryError, DirectoryError, HubError};
pub use history::{HistoryPool, SyncCursor};
pub use hub::{ClipboardShare, Hub, InviteReceipt};
pub use maintenance::Maintenance;
pub use system_env::SystemEnv;
