//! Per-room append-only operation logs.
//!
//! [`HistoryPool`] is the single source of truth for chat and clipboard
//! state. Each room owns one hash-chained log; projections replay it, and
//! clients catch up through [`HistoryPool::diff_since`].
//!
//! # Locking
//!
//! The room map sits behind a `RwLock` that is held only long enough to find
//! (or create) a room's log. Each log has its own `Mutex`, so appends to
//! different rooms never wait on each other while appends to the same room
//! serialize.
//!
//! # Trimming
//!
//! Logs are capped at [`HistoryLimits::max_operations_per_room`]. The oldest
//! operations are dropped without rehashing, so the retained log is a valid
//! suffix whose head names a parent that can no longer be fetched.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, RwLock},
};

use roomsync_core::{
    ChatMessage, ClipboardItem, Environment, HashInput, Item, OpType, Operation, RoomId, UserId,
    chain_hash,
};

use crate::{config::HistoryLimits, sync};

/// Position a client has synced up to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncCursor {
    /// Client has nothing yet
    Start,
    /// Last operation id seen. Unknown ids yield nothing.
    Id(u64),
    /// Last operation hash seen. Unknown hashes yield the full log.
    Hash(String),
}

impl SyncCursor {
    /// Build a cursor from the transport pair `(since, sinceHash)`.
    ///
    /// A non-empty hash wins over the id. Ids start at 1, so an id that does
    /// not parse maps to `Id(0)` and behaves like any other unknown id.
    pub fn from_parts(since_id: Option<&str>, since_hash: Option<&str>) -> Self {
        match (since_id.filter(|s| !s.is_empty()), since_hash.filter(|s| !s.is_empty())) {
            (_, Some(hash)) => Self::Hash(hash.to_owned()),
            (Some(id), None) => Self::Id(id.parse().unwrap_or(0)),
            (None, None) => Self::Start,
        }
    }
}

#[derive(Debug, Default)]
struct RoomLog {
    /// Id of the last appended operation
    last_id: u64,
    ops: VecDeque<Operation>,
}

impl RoomLog {
    fn append(
        &mut self,
        op_type: OpType,
        item: Arc<Item>,
        actor: &UserId,
        actor_name: &str,
        timestamp: u64,
    ) -> Operation {
        let (parent_id, parent_hash) = match self.ops.back() {
            Some(parent) => (Some(parent.id), parent.hash.clone()),
            None => (None, String::new()),
        };

        let hashed = chain_hash(
            &parent_hash,
            &HashInput {
                op_type,
                item_id: item.id(),
                item: item.fingerprint(),
                user_id: actor,
                user_name: actor_name,
                timestamp,
            },
        );

        self.last_id += 1;
        let op = Operation {
            id: self.last_id,
            parent_id,
            hash: hashed.hash,
            parent_hash,
            op_type,
            item_id: item.id().to_owned(),
            item,
            timestamp,
            user_id: actor.clone(),
            user_name: actor_name.to_owned(),
            fallback_hash: hashed.fallback,
        };

        self.ops.push_back(op.clone());
        op
    }

    /// Drop the oldest operations beyond `max`. Returns how many were dropped.
    fn trim(&mut self, max: usize) -> usize {
        let excess = self.ops.len().saturating_sub(max);
        self.ops.drain(..excess);
        excess
    }

    fn position(&self, pred: impl Fn(&Operation) -> bool) -> Option<usize> {
        self.ops.iter().position(pred)
    }

    fn after(&self, index: usize) -> Vec<Operation> {
        self.ops.iter().skip(index).cloned().collect()
    }
}

/// Append-only, hash-chained operation logs, one per room.
pub struct HistoryPool<E: Environment> {
    env: E,
    limits: HistoryLimits,
    rooms: RwLock<HashMap<RoomId, Arc<Mutex<RoomLog>>>>,
}

impl<E: Environment> HistoryPool<E> {
    /// Create an empty pool.
    pub fn new(env: E, limits: HistoryLimits) -> Self {
        Self { env, limits, rooms: RwLock::new(HashMap::new()) }
    }

    /// Limits this pool enforces.
    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    fn log(&self, room: &RoomId) -> Option<Arc<Mutex<RoomLog>>> {
        sync::read(&self.rooms).get(room).cloned()
    }

    fn log_or_create(&self, room: &RoomId) -> Arc<Mutex<RoomLog>> {
        if let Some(log) = self.log(room) {
            return log;
        }
        Arc::clone(sync::write(&self.rooms).entry(room.clone()).or_default())
    }

    /// Append an operation to `room`'s log and enforce the size cap.
    ///
    /// The log is created on first append. The returned operation is the
    /// one stored, hash included.
    pub fn append(
        &self,
        room: &RoomId,
        op_type: OpType,
        item: Arc<Item>,
        actor: &UserId,
        actor_name: &str,
    ) -> Operation {
        let log = self.log_or_create(room);
        let mut log = sync::lock(&log);

        let op = log.append(op_type, item, actor, actor_name, self.env.wall_clock_secs());

        let dropped = log.trim(self.limits.max_operations_per_room.max(1));
        if dropped > 0 {
            tracing::debug!(
                room = %room,
                dropped,
                kept = log.ops.len(),
                "trimmed operation log"
            );
        }

        op
    }

    /// Operations after `cursor`.
    ///
    /// - [`SyncCursor::Start`]: the whole log.
    /// - [`SyncCursor::Hash`]: everything after the matching operation, or
    ///   the whole log if the hash is unknown (trimmed or diverged).
    /// - [`SyncCursor::Id`]: everything after the matching operation, or
    ///   nothing if the id is unknown.
    pub fn diff_since(&self, room: &RoomId, cursor: &SyncCursor) -> Vec<Operation> {
        let Some(log) = self.log(room) else {
            return Vec::new();
        };
        let log = sync::lock(&log);

        match cursor {
            SyncCursor::Start => log.after(0),
            SyncCursor::Hash(hash) => match log.position(|op| op.hash == *hash) {
                Some(i) => log.after(i + 1),
                None => {
                    tracing::debug!(room = %room, "unknown sync hash, returning full log");
                    log.after(0)
                },
            },
            SyncCursor::Id(id) => match log.position(|op| op.id == *id) {
                Some(i) => log.after(i + 1),
                None => Vec::new(),
            },
        }
    }

    /// Current chat messages, oldest first, capped to the most recent
    /// [`HistoryLimits::max_chat_messages`].
    ///
    /// Messages with equal timestamps keep the order they first appeared in.
    pub fn project_chat(&self, room: &RoomId) -> Vec<ChatMessage> {
        let Some(log) = self.log(room) else {
            return Vec::new();
        };
        let log = sync::lock(&log);

        let mut messages = replay(&log.ops, |item| match item {
            Item::Chat(msg) => Some(msg),
            Item::Clipboard(_) => None,
        });
        messages.sort_by_key(|msg| msg.timestamp);

        let excess = messages.len().saturating_sub(self.limits.max_chat_messages);
        messages.into_iter().skip(excess).cloned().collect()
    }

    /// Current clipboard items in first-appearance order.
    pub fn project_clipboard(&self, room: &RoomId) -> Vec<ClipboardItem> {
        let Some(log) = self.log(room) else {
            return Vec::new();
        };
        let log = sync::lock(&log);

        replay(&log.ops, |item| match item {
            Item::Clipboard(clip) => Some(clip),
            Item::Chat(_) => None,
        })
        .into_iter()
        .cloned()
        .collect()
    }

    /// Look up a retained operation by id.
    pub fn operation(&self, room: &RoomId, id: u64) -> Option<Operation> {
        let log = self.log(room)?;
        let log = sync::lock(&log);
        log.ops.iter().find(|op| op.id == id).cloned()
    }

    /// Current value of an item: the payload of the latest operation
    /// touching it.
    pub fn item(&self, room: &RoomId, item_id: &str) -> Option<Arc<Item>> {
        let log = self.log(room)?;
        let log = sync::lock(&log);
        log.ops.iter().rev().find(|op| op.item_id == item_id).map(|op| Arc::clone(&op.item))
    }

    /// Replace an item's value and append a `Modify` operation for it.
    ///
    /// `update` computes the new value from the current one. The swap and
    /// the append happen under the room's lock, so no reader sees the old
    /// and new values mixed. Retained operations that referenced the item
    /// are pointed at the new value; their hashes are left as they were.
    ///
    /// Returns `Ok(None)` if the room or item is unknown.
    pub fn update_item<Err>(
        &self,
        room: &RoomId,
        item_id: &str,
        actor: &UserId,
        actor_name: &str,
        update: impl FnOnce(&Item) -> Result<Item, Err>,
    ) -> Result<Option<Operation>, Err> {
        let Some(log) = self.log(room) else {
            return Ok(None);
        };
        let mut log = sync::lock(&log);

        let Some(current) = log.ops.iter().rev().find(|op| op.item_id == item_id) else {
            return Ok(None);
        };

        let next = Arc::new(update(&current.item)?);
        for op in log.ops.iter_mut().filter(|op| op.item_id == item_id) {
            op.item = Arc::clone(&next);
        }

        let op = log.append(OpType::Modify, next, actor, actor_name, self.env.wall_clock_secs());
        log.trim(self.limits.max_operations_per_room.max(1));

        Ok(Some(op))
    }

    /// Discard a room's log. Returns whether one existed.
    pub fn drop_room(&self, room: &RoomId) -> bool {
        let dropped = sync::write(&self.rooms).remove(room).is_some();
        if dropped {
            tracing::debug!(room = %room, "dropped operation log");
        }
        dropped
    }

    /// Number of retained operations in `room`.
    pub fn len(&self, room: &RoomId) -> usize {
        self.log(room).map_or(0, |log| sync::lock(&log).ops.len())
    }

    /// Whether `room` has no retained operations.
    pub fn is_empty(&self, room: &RoomId) -> bool {
        self.len(room) == 0
    }

    /// Hash of the latest operation in `room`.
    pub fn latest_hash(&self, room: &RoomId) -> Option<String> {
        let log = self.log(room)?;
        let log = sync::lock(&log);
        log.ops.back().map(|op| op.hash.clone())
    }

    /// Copy of every room's retained log, for invariant checks.
    pub fn snapshot(&self) -> Vec<(RoomId, Vec<Operation>)> {
        let logs: Vec<_> = sync::read(&self.rooms)
            .iter()
            .map(|(room, log)| (room.clone(), Arc::clone(log)))
            .collect();

        let mut snapshot: Vec<_> =
            logs.into_iter().map(|(room, log)| (room, sync::lock(&log).after(0))).collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }
}

/// Replay `ops` into the current set of items of one kind, in
/// first-appearance order. `Add` and `Modify` upsert, `Remove` deletes.
fn replay<'a, T>(
    ops: &'a VecDeque<Operation>,
    select: impl Fn(&'a Item) -> Option<&'a T>,
) -> Vec<&'a T> {
    let mut current: HashMap<&str, (usize, &T)> = HashMap::new();

    for (seq, op) in ops.iter().enumerate() {
        let Some(value) = select(&*op.item) else {
            continue;
        };

        match op.op_type {
            OpType::Add | OpType::Modify => {
                current
                    .entry(op.item_id.as_str())
                    .and_modify(|entry| entry.1 = value)
                    .or_insert((seq, value));
            },
            OpType::Remove => {
                current.remove(op.item_id.as_str());
            },
        }
    }

    let mut ordered: Vec<_> = current.into_values().collect();
    ordered.sort_by_key(|(seq, _)| *seq);
    ordered.into_iter().map(|(_, value)| value).collect()
}
