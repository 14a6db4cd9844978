//! Archival collaborator.
//!
//! File shares arrive as a list of paths. Producing the archive (zip, tar,
//! single-file copy) is someone else's job; the hub only hands over the item
//! and later swaps in the returned [`ArchiveRef`].

use async_trait::async_trait;
use roomsync_core::{ArchiveRef, ClipboardItem, RoomId};
use thiserror::Error;

/// Archiving a clipboard file share failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("archive failed: {0}")]
pub struct ArchiveError(pub String);

/// Produces archives for clipboard file shares.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Archive the files of `item`, shared into `room`.
    async fn archive(&self, room: &RoomId, item: &ClipboardItem)
    -> Result<ArchiveRef, ArchiveError>;
}
