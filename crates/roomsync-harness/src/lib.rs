//! Deterministic test support for roomsync.
//!
//! - [`SimEnv`]: a wall clock that only moves when told to, with sleeping
//!   on Tokio's (pausable) timer
//! - [`RecordingSink`]: an [`EventSink`](roomsync_server::EventSink) that
//!   keeps every envelope it is given and can be switched to failing
//! - [`invariants`]: properties checked against directory and history
//!   snapshots after arbitrary operation sequences

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod recording_sink;
pub mod sim_env;

pub use invariants::{
    ChainIntegrity, Invariant, InvariantKind, InvariantRegistry, InvariantResult, LogBound,
    MembershipConsistency, OwnerKnown, SystemSnapshot, Violation,
};
pub use recording_sink::RecordingSink;
pub use sim_env::SimEnv;
