//! Payloads carried by operations.
//!
//! An [`Item`] is either a chat message or a clipboard capture. The variant is
//! fixed when the item is built; consumers match on it instead of probing
//! payload shapes at runtime.

use serde::{Deserialize, Serialize};

use crate::ids::{RoomId, UserId};

/// A chat message posted to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Item id (`msg_N`)
    pub id: String,
    /// Room the message was posted to
    pub room_id: RoomId,
    /// Author
    pub user_id: UserId,
    /// Author display name at send time
    pub user_name: String,
    /// Sanitized message body
    pub message: String,
    /// Unix seconds
    pub timestamp: u64,
}

/// What a clipboard capture holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipboardKind {
    /// Plain text
    Text,
    /// Encoded image bytes
    Image,
    /// File paths, shipped later as an archive
    File,
}

/// Metadata for an archive that holds exactly one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleFile {
    /// File name offered for download
    pub name: String,
    /// MIME type
    pub mime: String,
    /// Optional preview (data URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// Out-of-band reference to archived clipboard files.
///
/// The archive bytes themselves live with the archival collaborator; the log
/// only records where to fetch them and how large they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRef {
    /// Opaque fetch handle (download key, path, URL)
    pub handle: String,
    /// Archive size in bytes
    pub size_bytes: u64,
    /// Set when the archive is a single file sent as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_file: Option<SingleFile>,
}

/// A clipboard capture shared into a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardItem {
    /// Item id (`clip_N`)
    pub id: String,
    /// Content kind
    #[serde(rename = "type")]
    pub kind: ClipboardKind,
    /// Text content, or a status line for file shares
    #[serde(default)]
    pub text: String,
    /// Encoded image bytes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image: Vec<u8>,
    /// File paths on the sharer's machine
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    /// Archive produced for `files`, once ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveRef>,
}

impl ClipboardItem {
    /// Whether this capture still waits for an archive.
    pub fn needs_archive(&self) -> bool {
        self.kind == ClipboardKind::File && self.archive.is_none() && !self.files.is_empty()
    }

    /// New value of this item with `archive` attached and the status line
    /// rewritten. The original is left untouched.
    #[must_use]
    pub fn with_archive(&self, archive: ArchiveRef) -> Self {
        let text = match &archive.single_file {
            Some(file) => format!("{} ({}) ready", file.name, human_file_size(archive.size_bytes)),
            None => format!("{} files compressed (ready)", self.files.len()),
        };

        Self { text, archive: Some(archive), ..self.clone() }
    }
}

/// Payload of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Item {
    /// Chat message
    Chat(ChatMessage),
    /// Clipboard capture
    Clipboard(ClipboardItem),
}

impl Item {
    /// Item id, shared by every operation touching this item.
    pub fn id(&self) -> &str {
        match self {
            Self::Chat(msg) => &msg.id,
            Self::Clipboard(clip) => &clip.id,
        }
    }

    /// Minimal, stable projection of the item used for chain hashing.
    ///
    /// Large or evolving fields (image bytes, file paths, archive handles)
    /// are reduced to sizes and counts.
    pub fn fingerprint(&self) -> ItemFingerprint<'_> {
        match self {
            Self::Chat(msg) => ItemFingerprint::Chat {
                id: &msg.id,
                message: &msg.message,
                timestamp: msg.timestamp,
            },
            Self::Clipboard(clip) => ItemFingerprint::Clipboard {
                id: &clip.id,
                clipboard: clip.kind,
                text_len: clip.text.len(),
                file_count: clip.files.len(),
                image_bytes: clip.image.len(),
                archive_bytes: clip.archive.as_ref().map_or(0, |a| a.size_bytes),
            },
        }
    }
}

/// Hash input derived from an [`Item`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemFingerprint<'a> {
    /// Chat fingerprint
    Chat {
        /// Item id
        id: &'a str,
        /// Message body
        message: &'a str,
        /// Message timestamp
        timestamp: u64,
    },
    /// Clipboard fingerprint
    Clipboard {
        /// Item id
        id: &'a str,
        /// Content kind
        clipboard: ClipboardKind,
        /// Length of the text in bytes
        text_len: usize,
        /// Number of file paths
        file_count: usize,
        /// Image size in bytes
        image_bytes: usize,
        /// Archive size in bytes, 0 when not archived
        archive_bytes: u64,
    },
}

/// Human readable byte size (`512 B`, `1.5 KB`, `3.0 MB`).
pub fn human_file_size(size: u64) -> String {
    const UNIT: u64 = 1024;
    const SUFFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    if size < UNIT {
        return format!("{size} B");
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = size / UNIT;
    while n >= UNIT {
        n /= UNIT;
        div *= UNIT;
        exp += 1;
    }

    format!("{:.1} {}B", size as f64 / div as f64, SUFFIXES[exp])
}
