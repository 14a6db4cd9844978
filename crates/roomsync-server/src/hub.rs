//! Hub: the three components wired together.
//!
//! Every client action follows the same path: the [`Directory`] validates and
//! snapshots the member set, the [`HistoryPool`] appends, and the
//! [`EventDistributor`] pushes to whoever is connected. No component lock is
//! held while another component is called; directory transitions come back
//! as [`DirectoryAction`]s that [`Hub`] executes afterwards.
//!
//! The hub keeps two locks of its own. A per-room ordering lock is held from
//! authorization through append and fan-out, so pushes reach clients in log
//! order and a room's log is never recreated after the room is deleted. A
//! presence lock serializes connecting and offline cleanup.
//!
//! Delivery is best-effort. Clients that miss a push catch up through
//! [`Hub::operations_since`].

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use roomsync_core::{
    ArchiveRef, ChatMessage, ClipboardItem, ClipboardKind, Environment, EventFrame, EventKind,
    InviteId, Item, OpType, Operation, RoomId, UserId, sanitize,
};
use serde_json::json;
use tokio::sync::mpsc;

use crate::{
    archive::Archiver,
    config::HubConfig,
    directory::{
        Directory, DirectoryAction, JoinRequest, LeaveOutcome, PendingInvite, Room, RoomAccess,
        Transition, User,
    },
    distributor::{ChannelSink, ConnectionHandle, EventDistributor, EventSink},
    error::{DeliveryError, DirectoryError, HubError},
    history::{HistoryPool, SyncCursor},
    sync,
};

/// Result of [`Hub::invite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteReceipt {
    /// The recorded invite
    pub invite: PendingInvite,
    /// Whether the invitee's live connection accepted the event. The invite
    /// stays recorded either way.
    pub delivered: bool,
}

/// A clipboard capture as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardShare {
    /// Content kind
    pub kind: ClipboardKind,
    /// Text content or a status line
    pub text: String,
    /// Encoded image bytes
    pub image: Vec<u8>,
    /// File paths to archive
    pub files: Vec<String>,
    /// Archive, if the client already produced one
    pub archive: Option<ArchiveRef>,
}

impl ClipboardShare {
    /// Plain text share.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: ClipboardKind::Text,
            text: text.into(),
            image: Vec::new(),
            files: Vec::new(),
            archive: None,
        }
    }

    /// File share awaiting an archive.
    pub fn files(files: Vec<String>) -> Self {
        Self {
            kind: ClipboardKind::File,
            text: format!("{} files", files.len()),
            image: Vec::new(),
            files,
            archive: None,
        }
    }
}

/// Room directory, operation log and event fan-out behind one API.
pub struct Hub<E: Environment> {
    env: E,
    config: HubConfig,
    history: HistoryPool<E>,
    directory: Directory<E>,
    distributor: EventDistributor<E>,
    archiver: Option<Arc<dyn Archiver>>,
    chat_counter: AtomicU64,
    clip_counter: AtomicU64,
    /// Ordering lock per room with a live log.
    room_order: Mutex<HashMap<RoomId, Arc<Mutex<()>>>>,
    presence: Mutex<()>,
}

impl<E: Environment> Hub<E> {
    /// Create a hub with empty state.
    pub fn new(env: E, config: HubConfig) -> Self {
        Self {
            history: HistoryPool::new(env.clone(), config.history),
            directory: Directory::new(env.clone(), config.directory),
            distributor: EventDistributor::new(env.clone()),
            env,
            config,
            archiver: None,
            chat_counter: AtomicU64::new(0),
            clip_counter: AtomicU64::new(0),
            room_order: Mutex::new(HashMap::new()),
            presence: Mutex::new(()),
        }
    }

    /// Archive file shares with `archiver` as soon as they are appended.
    #[must_use]
    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = Some(archiver);
        self
    }

    /// Configuration in effect.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Environment in use.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// The operation log.
    pub fn history(&self) -> &HistoryPool<E> {
        &self.history
    }

    /// The room/user/invite directory.
    pub fn directory(&self) -> &Directory<E> {
        &self.directory
    }

    /// The live connection registry.
    pub fn distributor(&self) -> &EventDistributor<E> {
        &self.distributor
    }

    /// Ordering lock for `room`, or `None` if the room does not exist.
    fn room_order(&self, room: &RoomId) -> Option<Arc<Mutex<()>>> {
        let mut locks = sync::lock(&self.room_order);
        if let Some(order) = locks.get(room) {
            return Some(Arc::clone(order));
        }
        if !room.is_global() && self.directory.room(room).is_none() {
            return None;
        }
        Some(Arc::clone(locks.entry(room.clone()).or_default()))
    }

    /// Authorize `user` for `room` and run `f`, both under the room's
    /// ordering lock.
    fn ordered<T>(
        &self,
        user: &UserId,
        room: &RoomId,
        f: impl FnOnce(RoomAccess) -> Result<T, HubError>,
    ) -> Result<T, HubError> {
        let Some(order) = self.room_order(room) else {
            self.directory.authorize(user, room)?;
            return Err(DirectoryError::RoomNotFound(room.clone()).into());
        };
        let _ordered = sync::lock(&order);

        let access = self.directory.authorize(user, room)?;
        f(access)
    }

    /// Execute directory actions. Returns every delivery failure.
    fn dispatch(&self, actions: Vec<DirectoryAction>) -> Vec<DeliveryError> {
        let mut failures = Vec::new();

        for action in actions {
            match action {
                DirectoryAction::Unicast { user, kind, payload } => {
                    if let Err(e) = self.distributor.unicast(&user, kind, &payload) {
                        tracing::debug!(
                            user = %user,
                            event = %kind,
                            error = %e,
                            "unicast not delivered"
                        );
                        failures.push(e);
                    }
                },
                DirectoryAction::Multicast { members, kind, payload, exclude } => {
                    let report =
                        self.distributor.multicast(&members, kind, &payload, exclude.as_ref());
                    failures.extend(report.failed);
                },
                DirectoryAction::Broadcast { kind, payload } => {
                    failures.extend(self.distributor.broadcast(kind, &payload).failed);
                },
                DirectoryAction::DropRoomLog { room } => {
                    // Waits out any append that authorized before the delete
                    let order = sync::lock(&self.room_order).get(&room).cloned();
                    let _ordered = order.as_deref().map(sync::lock);
                    self.history.drop_room(&room);
                    sync::lock(&self.room_order).remove(&room);
                },
            }
        }

        failures
    }

    fn apply<T>(&self, transition: Transition<T>) -> T {
        self.dispatch(transition.actions);
        transition.value
    }

    /// Register a user and announce them to everyone.
    pub fn register_user(&self, name: &str) -> Result<User, HubError> {
        Ok(self.apply(self.directory.register_user(name)?))
    }

    /// Create an empty room and announce it to everyone.
    pub fn create_room(&self, name: &str, owner: &UserId) -> Result<Room, HubError> {
        Ok(self.apply(self.directory.create_room(name, owner)?))
    }

    /// Invite `invitee`. Delivery failure is reported, not fatal.
    pub fn invite(
        &self,
        inviter: &UserId,
        invitee: &UserId,
        message: &str,
    ) -> Result<InviteReceipt, HubError> {
        let transition = self.directory.invite(inviter, invitee, message)?;
        let failures = self.dispatch(transition.actions);

        let delivered = failures.is_empty();
        if !delivered {
            tracing::info!(
                invite = %transition.value.id,
                invitee = %invitee,
                "invite recorded but not delivered"
            );
        }

        Ok(InviteReceipt { invite: transition.value, delivered })
    }

    /// Accept an invite.
    pub fn accept_invite(&self, invite: &InviteId, invitee: &UserId) -> Result<Room, HubError> {
        Ok(self.apply(self.directory.accept_invite(invite, invitee)?))
    }

    /// Join a room directly (open rooms, or after approval).
    pub fn join_room(&self, user: &UserId, room: &RoomId) -> Result<Room, HubError> {
        Ok(self.apply(self.directory.join_room(user, room)?))
    }

    /// Ask the room owner for access. Fails if the owner could not be told.
    pub fn request_join(&self, user: &UserId, room: &RoomId) -> Result<JoinRequest, HubError> {
        let transition = self.directory.request_join(user, room)?;
        match self.dispatch(transition.actions).into_iter().next() {
            Some(e) => Err(HubError::Delivery(e)),
            None => Ok(transition.value),
        }
    }

    /// Owner approves a join request.
    pub fn approve_join(
        &self,
        owner: &UserId,
        requester: &UserId,
        room: &RoomId,
    ) -> Result<Room, HubError> {
        Ok(self.apply(self.directory.approve_join(owner, requester, room)?))
    }

    /// Leave the current room.
    pub fn leave_room(&self, user: &UserId) -> Result<LeaveOutcome, HubError> {
        Ok(self.apply(self.directory.leave_room(user)?))
    }

    /// Post a chat message. Every member but the sender is notified.
    pub fn send_chat(
        &self,
        user: &UserId,
        room: &RoomId,
        message: &str,
    ) -> Result<Operation, HubError> {
        let message = sanitize::chat_message(message);

        self.ordered(user, room, |access| {
            if message.is_empty() {
                return Err(HubError::EmptyMessage);
            }

            let n = self.chat_counter.fetch_add(1, Ordering::Relaxed) + 1;
            let chat = ChatMessage {
                id: format!("msg_{n}"),
                room_id: room.clone(),
                user_id: user.clone(),
                user_name: access.user_name.clone(),
                message,
                timestamp: self.env.wall_clock_secs(),
            };
            let payload = json!(chat);

            let op = self.history.append(
                room,
                OpType::Add,
                Arc::new(Item::Chat(chat)),
                user,
                &access.user_name,
            );
            self.distributor.multicast(
                &access.members,
                EventKind::ChatMessage,
                &payload,
                Some(user),
            );

            tracing::debug!(room = %room, user = %user, op = op.id, "chat message appended");
            Ok(op)
        })
    }

    /// Share a clipboard capture with every member, sender included.
    ///
    /// File shares without an archive are handed to the configured
    /// [`Archiver`] in the background.
    pub fn share_clipboard(
        self: &Arc<Self>,
        user: &UserId,
        room: &RoomId,
        share: ClipboardShare,
    ) -> Result<Operation, HubError> {
        self.ordered(user, room, |access| {
            let n = self.clip_counter.fetch_add(1, Ordering::Relaxed) + 1;
            let clip = ClipboardItem {
                id: format!("clip_{n}"),
                kind: share.kind,
                text: sanitize::clipboard_text(&share.text),
                image: share.image,
                files: share.files,
                archive: share.archive,
            };
            let needs_archive = clip.needs_archive();

            let op = self.history.append(
                room,
                OpType::Add,
                Arc::new(Item::Clipboard(clip.clone())),
                user,
                &access.user_name,
            );
            self.distributor.multicast(
                &access.members,
                EventKind::ClipboardCopied,
                &json!(op),
                None,
            );

            if needs_archive {
                self.spawn_archive(user, room, clip);
            }

            Ok(op)
        })
    }

    fn spawn_archive(self: &Arc<Self>, user: &UserId, room: &RoomId, clip: ClipboardItem) {
        let Some(archiver) = self.archiver.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(item = %clip.id, "no runtime for background archiving");
            return;
        };

        let hub = Arc::clone(self);
        let user = user.clone();
        let room = room.clone();
        runtime.spawn(async move {
            match archiver.archive(&room, &clip).await {
                Ok(archive) => {
                    if let Err(e) = hub.complete_archive(&user, &room, &clip.id, archive) {
                        tracing::warn!(
                            item = %clip.id,
                            error = %e,
                            "archive completed for vanished item"
                        );
                    }
                },
                Err(e) => tracing::warn!(item = %clip.id, error = %e, "archiving failed"),
            }
        });
    }

    /// Attach a finished archive to a clipboard item.
    ///
    /// The new item value is swapped in under the log's lock and announced
    /// with a `Modify` operation and a `clipboard_updated` event. The actor
    /// need not still be in the room.
    pub fn complete_archive(
        &self,
        actor: &UserId,
        room: &RoomId,
        item_id: &str,
        archive: ArchiveRef,
    ) -> Result<Operation, HubError> {
        let actor_name = self
            .directory
            .user(actor)
            .map(|u| u.name)
            .ok_or_else(|| DirectoryError::UserNotFound(actor.clone()))?;

        let not_found = || HubError::ItemNotFound { room: room.clone(), item: item_id.to_owned() };

        let order = self.room_order(room).ok_or_else(not_found)?;
        let _ordered = sync::lock(&order);
        let op = self
            .history
            .update_item(room, item_id, actor, &actor_name, |item| match item {
                Item::Clipboard(clip) => Ok(Item::Clipboard(clip.with_archive(archive))),
                Item::Chat(_) => Err(HubError::NotClipboard(item_id.to_owned())),
            })?
            .ok_or_else(not_found)?;

        let members = self.directory.room(room).map(|r| r.member_ids).unwrap_or_default();
        self.distributor.multicast(&members, EventKind::ClipboardUpdated, &json!(op), None);

        tracing::debug!(room = %room, item = %item_id, op = op.id, "archive attached");
        Ok(op)
    }

    /// Operations after `cursor`, for members only.
    pub fn operations_since(
        &self,
        user: &UserId,
        room: &RoomId,
        cursor: &SyncCursor,
    ) -> Result<Vec<Operation>, HubError> {
        self.directory.authorize(user, room)?;
        Ok(self.history.diff_since(room, cursor))
    }

    /// Current chat projection, for members only.
    pub fn chat_history(&self, user: &UserId, room: &RoomId) -> Result<Vec<ChatMessage>, HubError> {
        self.directory.authorize(user, room)?;
        Ok(self.history.project_chat(room))
    }

    /// Current clipboard projection, for members only.
    pub fn clipboard_items(
        &self,
        user: &UserId,
        room: &RoomId,
    ) -> Result<Vec<ClipboardItem>, HubError> {
        self.directory.authorize(user, room)?;
        Ok(self.history.project_clipboard(room))
    }

    /// Register a live connection, mark the user online and greet them.
    pub fn connect(&self, user: &UserId, sink: impl EventSink + 'static) -> ConnectionHandle {
        let handle = {
            let _presence = sync::lock(&self.presence);
            let handle = self.distributor.connect(user, sink);
            self.directory.set_online(user);
            handle
        };

        if let Err(e) =
            self.distributor.unicast(user, EventKind::Connected, &json!({ "status": "connected" }))
        {
            tracing::debug!(user = %user, error = %e, "greeting not delivered");
        }
        handle
    }

    /// Connect `user` through a bounded channel sized by
    /// [`HubConfig::event_buffer`]. The transport drains the receiver.
    pub fn connect_channel(&self, user: &UserId) -> (ConnectionHandle, mpsc::Receiver<EventFrame>) {
        let (sink, rx) = ChannelSink::channel(self.config.event_buffer);
        (self.connect(user, sink), rx)
    }

    /// Tear down a connection. Unless the user has reconnected meanwhile,
    /// they leave their room, go offline, and everyone is told.
    pub fn disconnect(&self, handle: &ConnectionHandle) {
        let user = handle.user();
        let offline = {
            let _presence = sync::lock(&self.presence);
            self.distributor.disconnect(handle);
            if self.distributor.is_connected(user) {
                tracing::debug!(user = %user, "user reconnected, skipping offline cleanup");
                return;
            }
            self.directory.go_offline(user)
        };

        self.apply(offline);
    }

    /// Drive one live connection until `closed` resolves or a heartbeat
    /// fails, then clean up.
    pub async fn run_session(
        &self,
        user: &UserId,
        sink: impl EventSink + 'static,
        closed: impl Future<Output = ()>,
    ) {
        let handle = self.connect(user, sink);
        tokio::pin!(closed);

        loop {
            tokio::select! {
                () = &mut closed => break,
                () = self.env.sleep(self.config.heartbeat_interval) => {
                    if !self.distributor.is_current(&handle) {
                        break;
                    }
                    if let Err(e) = self.distributor.heartbeat(user) {
                        tracing::debug!(user = %user, error = %e, "heartbeat failed");
                        break;
                    }
                },
            }
        }

        self.disconnect(&handle);
    }

    /// Drop expired invites. Returns how many were dropped.
    pub fn reap_expired_invites(&self) -> usize {
        self.directory.reap_expired_invites().len()
    }

    /// Delete member-less rooms and their logs. Returns how many were
    /// deleted.
    pub fn reap_empty_rooms(&self) -> usize {
        self.apply(self.directory.reap_empty_rooms()).len()
    }
}
