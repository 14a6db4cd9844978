//! Hash-chained log operations.
//!
//! Every operation records the hash of its predecessor in the same room, so a
//! client holding the last hash it saw can ask for "everything after this".
//! The hash is a sync checksum, not a security primitive: it is SHA-256 over
//! the parent hash followed by a canonical JSON encoding of a small
//! projection of the operation.
//!
//! # Fallback hashes
//!
//! If canonical encoding fails the operation is still appended, hashed over
//! `fallback-<timestamp>` instead, and flagged with `fallback_hash = true`.
//! Clients can use the flag to distrust the checksum; `parent_hash` still
//! names the predecessor so the chain stays linked.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    ids::UserId,
    item::{Item, ItemFingerprint},
};

/// Kind of change an operation applies to its item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    /// Insert (or overwrite) the item
    Add,
    /// Delete the item
    Remove,
    /// Replace the item with an updated value
    Modify,
}

/// One entry in a room's append-only log.
///
/// Operations are never mutated once appended. The one exception is the
/// `item` reference: a background step (archive completion) may swap it for
/// a new value under the log's lock, and then appends a `Modify` operation
/// announcing the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Room-scoped, monotonic, starting at 1
    pub id: u64,
    /// Id of the predecessor, `None` at the chain head
    pub parent_id: Option<u64>,
    /// Chain hash of this operation (hex SHA-256)
    pub hash: String,
    /// Hash of the predecessor, empty at the chain head
    pub parent_hash: String,
    /// Kind of change
    pub op_type: OpType,
    /// Id of the item this operation touches
    pub item_id: String,
    /// Current value of the item
    pub item: Arc<Item>,
    /// Unix seconds at append
    pub timestamp: u64,
    /// Acting user
    pub user_id: UserId,
    /// Acting user's display name
    pub user_name: String,
    /// Set when `hash` came from the fallback path
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback_hash: bool,
}

impl Operation {
    /// Whether `self` directly follows `prev` in the chain.
    pub fn follows(&self, prev: &Self) -> bool {
        self.parent_hash == prev.hash && self.parent_id == Some(prev.id)
    }
}

/// Canonical hash input. The parent hash is mixed in separately.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashInput<'a> {
    /// Kind of change
    pub op_type: OpType,
    /// Item id
    pub item_id: &'a str,
    /// Item fingerprint
    pub item: ItemFingerprint<'a>,
    /// Acting user
    pub user_id: &'a UserId,
    /// Acting user's display name
    pub user_name: &'a str,
    /// Unix seconds
    pub timestamp: u64,
}

/// Output of [`chain_hash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHash {
    /// Hex encoded SHA-256
    pub hash: String,
    /// Whether the fallback path produced `hash`
    pub fallback: bool,
}

/// `H(parent_hash ‖ canonical(input))`, or the flagged fallback.
pub fn chain_hash(parent_hash: &str, input: &HashInput<'_>) -> ChainHash {
    digest_encoded(parent_hash, serde_json::to_vec(input), input.timestamp)
}

fn digest_encoded(
    parent_hash: &str,
    encoded: Result<Vec<u8>, serde_json::Error>,
    timestamp: u64,
) -> ChainHash {
    match encoded {
        Ok(bytes) => {
            let mut hasher = Sha256::new();
            hasher.update(parent_hash.as_bytes());
            hasher.update(&bytes);
            ChainHash { hash: hex::encode(hasher.finalize()), fallback: false }
        },
        Err(e) => {
            tracing::warn!(error = %e, timestamp, "canonical encoding failed, using fallback hash");
            let digest = Sha256::digest(format!("fallback-{timestamp}").as_bytes());
            ChainHash { hash: hex::encode(digest), fallback: true }
        },
    }
}

/// A pair of adjacent operations whose link is broken.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("operation {child} does not follow operation {parent}")]
pub struct ChainBreak {
    /// Id of the earlier operation
    pub parent: u64,
    /// Id of the later operation
    pub child: u64,
}

/// Check that every adjacent pair in `ops` is linked.
///
/// The first operation's parent is not checked: after trimming it is no
/// longer present.
pub fn verify_chain(ops: &[Operation]) -> Result<(), ChainBreak> {
    for pair in ops.windows(2) {
        if !pair[1].follows(&pair[0]) {
            return Err(ChainBreak { parent: pair[0].id, child: pair[1].id });
        }
    }
    Ok(())
}
