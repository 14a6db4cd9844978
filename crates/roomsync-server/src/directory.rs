//! Users, rooms and pending invites.
//!
//! The directory owns the membership state machine and nothing else. Every
//! mutating call validates all of its preconditions first, then mutates, then
//! returns the events that should be pushed as [`DirectoryAction`]s. The
//! caller executes those actions after the directory's lock is released, so
//! event delivery never runs under this lock.
//!
//! # Membership invariant
//!
//! `user.room_id == Some(r.id)` iff `user.id` is in `r.member_ids`, for
//! exactly one room `r`. A user is in at most one room at a time.
//!
//! # Room lifecycle
//!
//! Rooms come from an explicit [`Directory::create_room`] or from accepting a
//! fresh invite. A room is deleted when a departure leaves it with fewer than
//! two members. Rooms that never gained members are swept by
//! [`Directory::reap_empty_rooms`].
//!
//! # Approval
//!
//! Rooms owned by a regular user are permissioned: only the owner and users
//! on `approved_user_ids` may join. Host-owned rooms are open.

use std::{collections::HashMap, sync::Mutex};

use roomsync_core::{Environment, EventKind, InviteId, RoomId, UserId, sanitize};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{config::DirectoryConfig, error::DirectoryError, sync};

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// `user_N`
    pub id: UserId,
    /// Sanitized, unique display name
    pub name: String,
    /// Room the user is in, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Whether the user has a live connection
    pub is_online: bool,
}

/// A room and its membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// `room_N`
    pub id: RoomId,
    /// Display name
    pub name: String,
    /// Owner; the host identity makes the room open
    pub owner_id: UserId,
    /// Members in join order, no duplicates
    pub member_ids: Vec<UserId>,
    /// Users allowed to join a permissioned room
    pub approved_user_ids: Vec<UserId>,
}

impl Room {
    /// Whether `user` is a member.
    pub fn has_member(&self, user: &UserId) -> bool {
        self.member_ids.contains(user)
    }

    /// Whether joining requires owner approval.
    pub fn is_permissioned(&self) -> bool {
        !self.owner_id.is_host()
    }

    fn may_join(&self, user: &UserId) -> bool {
        !self.is_permissioned() || self.owner_id == *user || self.approved_user_ids.contains(user)
    }

    fn approve(&mut self, user: &UserId) {
        if !self.approved_user_ids.contains(user) {
            self.approved_user_ids.push(user.clone());
        }
    }
}

/// A time-boxed, single-use proposal to join a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInvite {
    /// `invite_N`
    pub id: InviteId,
    /// Who sent it
    pub inviter_id: UserId,
    /// Who may accept it
    pub invitee_id: UserId,
    /// Sanitized message shown to the invitee
    pub message: String,
    /// Room the inviter was in when inviting; `None` creates a new room
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Unix seconds
    pub created_at: u64,
    /// Unix seconds after which the invite can no longer be accepted
    pub expires_at: u64,
}

/// Events the directory wants pushed, executed by the caller after the
/// directory lock is released.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryAction {
    /// Push to one user
    Unicast {
        /// Recipient
        user: UserId,
        /// Event kind
        kind: EventKind,
        /// Event payload
        payload: Value,
    },

    /// Push to a snapshot of a member set
    Multicast {
        /// Recipients, taken under the directory lock
        members: Vec<UserId>,
        /// Event kind
        kind: EventKind,
        /// Event payload
        payload: Value,
        /// Recipient to skip
        exclude: Option<UserId>,
    },

    /// Push to every connected user
    Broadcast {
        /// Event kind
        kind: EventKind,
        /// Event payload
        payload: Value,
    },

    /// A room was deleted; its operation log should be discarded
    DropRoomLog {
        /// Deleted room
        room: RoomId,
    },
}

/// Result of a successful directory call: the value plus the events it
/// produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<T> {
    /// Call result
    pub value: T,
    /// Events to execute after the lock is released
    pub actions: Vec<DirectoryAction>,
}

impl<T> Transition<T> {
    fn new(value: T, actions: Vec<DirectoryAction>) -> Self {
        Self { value, actions }
    }

    fn quiet(value: T) -> Self {
        Self { value, actions: Vec::new() }
    }
}

/// Outcome of [`Directory::leave_room`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Room that was left
    pub room_id: RoomId,
    /// Whether the room was deleted as a result
    pub room_deleted: bool,
    /// New owner, if ownership moved
    pub new_owner: Option<UserId>,
}

/// Outcome of [`Directory::request_join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinRequest {
    /// Requester is already a member; nobody was notified
    AlreadyMember,
    /// The owner should be notified
    Sent {
        /// Owner who must approve
        owner: UserId,
    },
}

/// What a member may see of a room when reading or writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAccess {
    /// Acting user's display name
    pub user_name: String,
    /// Member snapshot for fan-out; empty for the global room
    pub members: Vec<UserId>,
}

/// Point-in-time copy of the directory, for invariant checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    /// All users, sorted by id
    pub users: Vec<User>,
    /// All rooms, sorted by id
    pub rooms: Vec<Room>,
    /// Pending invites, sorted by id
    pub invites: Vec<PendingInvite>,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    rooms: HashMap<RoomId, Room>,
    invites: HashMap<InviteId, PendingInvite>,
    user_counter: u64,
    room_counter: u64,
    invite_counter: u64,
}

impl State {
    fn user(&self, id: &UserId) -> Result<&User, DirectoryError> {
        self.users.get(id).ok_or_else(|| DirectoryError::UserNotFound(id.clone()))
    }

    fn room(&self, id: &RoomId) -> Result<&Room, DirectoryError> {
        self.rooms.get(id).ok_or_else(|| DirectoryError::RoomNotFound(id.clone()))
    }

    fn next_room_id(&mut self) -> (RoomId, u64) {
        self.room_counter += 1;
        (RoomId::new(format!("room_{}", self.room_counter)), self.room_counter)
    }

    /// Add `user` to `room` and point the user at it. Preconditions are the
    /// caller's job.
    fn add_member(&mut self, user: &UserId, room: &RoomId) {
        if let Some(u) = self.users.get_mut(user) {
            u.room_id = Some(room.clone());
        }
        if let Some(r) = self.rooms.get_mut(room) {
            r.member_ids.push(user.clone());
        }
    }

    /// `user_joined` for `user`, addressed to the room's current members.
    fn joined_event(&self, user: &UserId, room: &RoomId) -> Option<DirectoryAction> {
        let user = self.users.get(user)?;
        let room = self.rooms.get(room)?;

        Some(DirectoryAction::Multicast {
            members: room.member_ids.clone(),
            kind: EventKind::UserJoined,
            payload: json!({
                "roomId": room.id,
                "roomName": room.name,
                "userId": user.id,
                "userName": user.name,
            }),
            exclude: None,
        })
    }

    /// Remove a room and clear every remaining member's room reference.
    fn delete_room(&mut self, room: &RoomId) -> Option<Room> {
        let removed = self.rooms.remove(room)?;
        for member in &removed.member_ids {
            if let Some(user) = self.users.get_mut(member) {
                user.room_id = None;
            }
        }
        Some(removed)
    }
}

/// Owner of users, rooms and invites.
pub struct Directory<E: Environment> {
    env: E,
    config: DirectoryConfig,
    state: Mutex<State>,
}

impl<E: Environment> Directory<E> {
    /// Create an empty directory.
    pub fn new(env: E, config: DirectoryConfig) -> Self {
        Self { env, config, state: Mutex::new(State::default()) }
    }

    /// Register a new user under a unique, sanitized name.
    pub fn register_user(&self, name: &str) -> Result<Transition<User>, DirectoryError> {
        let name = sanitize::user_name(name);
        if name.is_empty() {
            return Err(DirectoryError::InvalidName("user name is empty".into()));
        }

        let mut state = sync::lock(&self.state);
        if state.users.values().any(|u| u.name == name) {
            return Err(DirectoryError::NameTaken(name));
        }

        state.user_counter += 1;
        let user = User {
            id: UserId::new(format!("user_{}", state.user_counter)),
            name,
            room_id: None,
            is_online: true,
        };
        state.users.insert(user.id.clone(), user.clone());
        drop(state);

        tracing::info!(user = %user.id, name = %user.name, "user registered");

        let payload = json!(user);
        Ok(Transition::new(user, vec![DirectoryAction::Broadcast {
            kind: EventKind::UserCreated,
            payload,
        }]))
    }

    /// Create an empty room owned by `owner` (the host or a registered
    /// user). The owner is not joined.
    pub fn create_room(
        &self,
        name: &str,
        owner: &UserId,
    ) -> Result<Transition<Room>, DirectoryError> {
        let mut state = sync::lock(&self.state);
        if !owner.is_host() {
            state.user(owner)?;
        }

        let (id, n) = state.next_room_id();
        let name = match sanitize::room_name(name) {
            name if name.is_empty() => format!("Room {n}"),
            name => name,
        };

        let room = Room {
            id,
            name,
            owner_id: owner.clone(),
            member_ids: Vec::new(),
            approved_user_ids: Vec::new(),
        };
        state.rooms.insert(room.id.clone(), room.clone());
        drop(state);

        tracing::info!(room = %room.id, owner = %room.owner_id, "room created");

        let payload = json!(room);
        Ok(Transition::new(room, vec![DirectoryAction::Broadcast {
            kind: EventKind::RoomCreated,
            payload,
        }]))
    }

    /// Invite `invitee` to the inviter's current room, or to a room created
    /// on accept if the inviter is in none.
    ///
    /// A newer invite for the same `(inviter, invitee)` pair replaces the
    /// pending one.
    pub fn invite(
        &self,
        inviter: &UserId,
        invitee: &UserId,
        message: &str,
    ) -> Result<Transition<PendingInvite>, DirectoryError> {
        let now = self.env.wall_clock_secs();
        let mut state = sync::lock(&self.state);

        let invitee_user = state.user(invitee)?;
        let inviter_user = state.user(inviter)?;

        if inviter == invitee {
            return Err(DirectoryError::PermissionDenied("cannot invite yourself".into()));
        }

        let target = match &inviter_user.room_id {
            Some(room_id) => Some(state.room(room_id)?),
            None => None,
        };

        if let Some(room) = &invitee_user.room_id {
            return Err(DirectoryError::AlreadyInRoom { user: invitee.clone(), room: room.clone() });
        }

        let message = match sanitize::invite_message(message) {
            m if m.is_empty() => format!("Hi, it's me, {}.", inviter_user.name),
            m => m,
        };

        let mut payload = json!({
            "inviterId": inviter,
            "inviter": inviter_user.name,
            "message": message,
        });
        let room_id = target.map(|room| {
            payload["roomId"] = json!(room.id);
            payload["roomName"] = json!(room.name);
            room.id.clone()
        });

        state.invites.retain(|_, i| !(i.inviter_id == *inviter && i.invitee_id == *invitee));

        state.invite_counter += 1;
        let invite = PendingInvite {
            id: InviteId::new(format!("invite_{}", state.invite_counter)),
            inviter_id: inviter.clone(),
            invitee_id: invitee.clone(),
            message,
            room_id,
            created_at: now,
            expires_at: now.saturating_add(self.config.invite_ttl.as_secs()),
        };
        state.invites.insert(invite.id.clone(), invite.clone());
        drop(state);

        payload["inviteId"] = json!(invite.id);
        payload["expiresAt"] = json!(invite.expires_at);

        tracing::info!(
            invite = %invite.id,
            inviter = %inviter,
            invitee = %invitee,
            "invite created"
        );

        Ok(Transition::new(invite, vec![DirectoryAction::Unicast {
            user: invitee.clone(),
            kind: EventKind::UserInvited,
            payload,
        }]))
    }

    /// Accept an invite as `invitee`.
    ///
    /// An invite addressed to someone else is left untouched. Any other
    /// outcome, success or failure, consumes it.
    pub fn accept_invite(
        &self,
        invite_id: &InviteId,
        invitee: &UserId,
    ) -> Result<Transition<Room>, DirectoryError> {
        let now = self.env.wall_clock_secs();
        let mut state = sync::lock(&self.state);

        let invite = state
            .invites
            .get(invite_id)
            .cloned()
            .ok_or_else(|| DirectoryError::InviteNotFound(invite_id.clone()))?;

        if invite.invitee_id != *invitee {
            return Err(DirectoryError::InviteNotForUser(invite_id.clone()));
        }

        state.invites.remove(invite_id);

        if now > invite.expires_at {
            tracing::debug!(invite = %invite_id, "invite expired before accept");
            return Err(DirectoryError::InviteExpired(invite_id.clone()));
        }

        let result = match &invite.room_id {
            Some(room) => self.accept_into_room(&mut state, &invite, room),
            None => Self::accept_fresh(&mut state, &invite),
        };

        if let Ok(transition) = &result {
            tracing::info!(invite = %invite_id, room = %transition.value.id, "invite accepted");
        }
        result
    }

    fn accept_into_room(
        &self,
        state: &mut State,
        invite: &PendingInvite,
        room_id: &RoomId,
    ) -> Result<Transition<Room>, DirectoryError> {
        let inviter = state.user(&invite.inviter_id)?;
        let invitee = state.user(&invite.invitee_id)?;

        if inviter.room_id.as_ref() != Some(room_id) {
            return Err(DirectoryError::InviterLeftRoom(room_id.clone()));
        }
        if let Some(current) = &invitee.room_id {
            return Err(DirectoryError::AlreadyInRoom {
                user: invitee.id.clone(),
                room: current.clone(),
            });
        }

        let room = state.room(room_id)?;
        self.check_capacity(room)?;

        if let Some(room) = state.rooms.get_mut(room_id) {
            if room.is_permissioned() {
                room.approve(&invite.invitee_id);
            }
        }

        state.add_member(&invite.invitee_id, room_id);
        let actions = state.joined_event(&invite.invitee_id, room_id).into_iter().collect();
        let room = state.room(room_id)?.clone();
        Ok(Transition::new(room, actions))
    }

    fn accept_fresh(
        state: &mut State,
        invite: &PendingInvite,
    ) -> Result<Transition<Room>, DirectoryError> {
        for party in [&invite.inviter_id, &invite.invitee_id] {
            if let Some(room) = &state.user(party)?.room_id {
                return Err(DirectoryError::AlreadyInRoom {
                    user: party.clone(),
                    room: room.clone(),
                });
            }
        }

        let (id, n) = state.next_room_id();
        let parties = [invite.inviter_id.clone(), invite.invitee_id.clone()];
        let room = Room {
            id: id.clone(),
            name: format!("Room {n}"),
            owner_id: invite.inviter_id.clone(),
            member_ids: Vec::new(),
            approved_user_ids: parties.to_vec(),
        };
        state.rooms.insert(id.clone(), room);

        for party in &parties {
            state.add_member(party, &id);
        }
        // Each join is announced to both parties so each sees the other
        let actions = parties.iter().filter_map(|party| state.joined_event(party, &id)).collect();

        tracing::info!(room = %id, owner = %invite.inviter_id, "room created from invite");

        let room = state.room(&id)?.clone();
        Ok(Transition::new(room, actions))
    }

    fn check_capacity(&self, room: &Room) -> Result<(), DirectoryError> {
        match self.config.max_room_members {
            Some(max) if room.member_ids.len() >= max => {
                Err(DirectoryError::RoomFull(room.id.clone()))
            },
            _ => Ok(()),
        }
    }

    /// Validate that `user` may enter `room`. `Ok(true)` means the user is
    /// already a member.
    fn check_join(
        &self,
        state: &State,
        user: &UserId,
        room: &RoomId,
        approved: bool,
    ) -> Result<bool, DirectoryError> {
        let user = state.user(user)?;
        let room = state.room(room)?;

        if !approved && !room.may_join(&user.id) {
            return Err(DirectoryError::PermissionDenied("join request required".into()));
        }
        if room.has_member(&user.id) {
            return Ok(true);
        }
        if let Some(current) = &user.room_id {
            return Err(DirectoryError::AlreadyInRoom {
                user: user.id.clone(),
                room: current.clone(),
            });
        }
        self.check_capacity(room)?;
        Ok(false)
    }

    /// Join `room`. Joining a room one is already in is a no-op.
    pub fn join_room(
        &self,
        user: &UserId,
        room: &RoomId,
    ) -> Result<Transition<Room>, DirectoryError> {
        let mut state = sync::lock(&self.state);

        if self.check_join(&state, user, room, false)? {
            return Ok(Transition::quiet(state.room(room)?.clone()));
        }

        state.add_member(user, room);
        let actions = state.joined_event(user, room).into_iter().collect();
        tracing::info!(user = %user, room = %room, "user joined room");

        Ok(Transition::new(state.room(room)?.clone(), actions))
    }

    /// Ask the owner of `room` to let `user` in. Membership is unchanged.
    pub fn request_join(
        &self,
        user: &UserId,
        room: &RoomId,
    ) -> Result<Transition<JoinRequest>, DirectoryError> {
        let state = sync::lock(&self.state);
        let requester = state.user(user)?;
        let room = state.room(room)?;

        if room.has_member(user) {
            return Ok(Transition::quiet(JoinRequest::AlreadyMember));
        }

        let action = DirectoryAction::Unicast {
            user: room.owner_id.clone(),
            kind: EventKind::JoinRequest,
            payload: json!({
                "roomId": room.id,
                "roomName": room.name,
                "requesterId": requester.id,
                "requesterName": requester.name,
            }),
        };

        Ok(Transition::new(JoinRequest::Sent { owner: room.owner_id.clone() }, vec![action]))
    }

    /// Approve `requester` into `room` and join them. Only the owner may
    /// approve.
    pub fn approve_join(
        &self,
        owner: &UserId,
        requester: &UserId,
        room: &RoomId,
    ) -> Result<Transition<Room>, DirectoryError> {
        let mut state = sync::lock(&self.state);

        if state.room(room)?.owner_id != *owner {
            return Err(DirectoryError::PermissionDenied("not room owner".into()));
        }
        let already_member = self.check_join(&state, requester, room, true)?;

        if let Some(r) = state.rooms.get_mut(room) {
            r.approve(requester);
        }
        if already_member {
            return Ok(Transition::quiet(state.room(room)?.clone()));
        }

        state.add_member(requester, room);
        let actions = state.joined_event(requester, room).into_iter().collect();
        tracing::info!(user = %requester, room = %room, "join approved");

        Ok(Transition::new(state.room(room)?.clone(), actions))
    }

    /// Leave the user's current room.
    ///
    /// If the owner leaves, ownership passes to the earliest remaining
    /// member. If fewer than two members remain, the room is deleted and the
    /// remaining member (if any) is told.
    pub fn leave_room(&self, user: &UserId) -> Result<Transition<LeaveOutcome>, DirectoryError> {
        let mut state = sync::lock(&self.state);
        Self::leave_locked(&mut state, user)
    }

    fn leave_locked(
        state: &mut State,
        user_id: &UserId,
    ) -> Result<Transition<LeaveOutcome>, DirectoryError> {
        let user = state.user(user_id)?;
        let room_id =
            user.room_id.clone().ok_or_else(|| DirectoryError::NotInRoom(user_id.clone()))?;
        let user_name = user.name.clone();

        let Some(room) = state.rooms.get_mut(&room_id) else {
            return Err(DirectoryError::RoomNotFound(room_id));
        };
        room.member_ids.retain(|m| m != user_id);

        let mut new_owner = None;
        if room.owner_id == *user_id {
            if let Some(first) = room.member_ids.first() {
                room.owner_id = first.clone();
                new_owner = Some(first.clone());
                tracing::info!(room = %room_id, owner = %first, "room ownership transferred");
            }
        }

        let remaining = room.member_ids.clone();
        let mut actions = vec![DirectoryAction::Multicast {
            members: remaining.clone(),
            kind: EventKind::UserLeft,
            payload: json!({
                "roomId": room.id,
                "roomName": room.name,
                "userId": user_id,
                "userName": user_name,
                "ownerId": room.owner_id,
            }),
            exclude: None,
        }];

        if let Some(u) = state.users.get_mut(user_id) {
            u.room_id = None;
        }

        let room_deleted = remaining.len() < 2;
        if room_deleted {
            if let Some(room) = state.delete_room(&room_id) {
                if !remaining.is_empty() {
                    actions.push(DirectoryAction::Multicast {
                        members: remaining,
                        kind: EventKind::RoomDeleted,
                        payload: json!({ "roomId": room.id, "roomName": room.name }),
                        exclude: None,
                    });
                }
            }
            actions.push(DirectoryAction::DropRoomLog { room: room_id.clone() });
            tracing::info!(room = %room_id, "room deleted after last departure");
        }

        tracing::info!(user = %user_id, room = %room_id, "user left room");

        Ok(Transition::new(LeaveOutcome { room_id, room_deleted, new_owner }, actions))
    }

    /// Check that `user` may read and write `room`, and snapshot the member
    /// set for fan-out.
    ///
    /// The global room only requires a registered user and has no members.
    pub fn authorize(&self, user: &UserId, room: &RoomId) -> Result<RoomAccess, DirectoryError> {
        let state = sync::lock(&self.state);
        let user = state.user(user)?;

        if room.is_global() {
            return Ok(RoomAccess { user_name: user.name.clone(), members: Vec::new() });
        }

        let room_state = state.room(room)?;
        if !room_state.has_member(&user.id) {
            return Err(DirectoryError::NotMember { user: user.id.clone(), room: room.clone() });
        }

        Ok(RoomAccess { user_name: user.name.clone(), members: room_state.member_ids.clone() })
    }

    /// Mark a user online. Returns `false` for unknown users.
    pub fn set_online(&self, user: &UserId) -> bool {
        let mut state = sync::lock(&self.state);
        match state.users.get_mut(user) {
            Some(u) => {
                u.is_online = true;
                true
            },
            None => false,
        }
    }

    /// A user's last connection went away: leave any room, mark offline and
    /// tell everyone.
    pub fn go_offline(&self, user: &UserId) -> Transition<()> {
        let mut state = sync::lock(&self.state);
        let Some(in_room) = state.users.get(user).map(|u| u.room_id.is_some()) else {
            return Transition::quiet(());
        };

        let mut actions = Vec::new();
        if in_room {
            match Self::leave_locked(&mut state, user) {
                Ok(left) => actions.extend(left.actions),
                Err(e) => {
                    tracing::warn!(user = %user, error = %e, "offline cleanup failed to leave");
                },
            }
        }

        if let Some(u) = state.users.get_mut(user) {
            u.is_online = false;
        }
        actions.push(DirectoryAction::Broadcast {
            kind: EventKind::UserOffline,
            payload: json!({ "userId": user }),
        });

        tracing::info!(user = %user, "user went offline");
        Transition::new((), actions)
    }

    /// Drop invites whose TTL elapsed. Returns the dropped ids.
    pub fn reap_expired_invites(&self) -> Vec<InviteId> {
        let now = self.env.wall_clock_secs();
        let mut state = sync::lock(&self.state);

        let expired: Vec<InviteId> = state
            .invites
            .values()
            .filter(|i| now > i.expires_at)
            .map(|i| i.id.clone())
            .collect();
        for id in &expired {
            state.invites.remove(id);
        }

        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "reaped expired invites");
        }
        expired
    }

    /// Delete rooms that have no members.
    pub fn reap_empty_rooms(&self) -> Transition<Vec<RoomId>> {
        let mut state = sync::lock(&self.state);

        let empty: Vec<RoomId> = state
            .rooms
            .values()
            .filter(|r| r.member_ids.is_empty())
            .map(|r| r.id.clone())
            .collect();
        for id in &empty {
            state.rooms.remove(id);
        }
        drop(state);

        if !empty.is_empty() {
            tracing::info!(count = empty.len(), "reaped empty rooms");
        }

        let actions =
            empty.iter().map(|room| DirectoryAction::DropRoomLog { room: room.clone() }).collect();
        Transition::new(empty, actions)
    }

    /// Look up a user.
    pub fn user(&self, id: &UserId) -> Option<User> {
        sync::lock(&self.state).users.get(id).cloned()
    }

    /// Look up a room.
    pub fn room(&self, id: &RoomId) -> Option<Room> {
        sync::lock(&self.state).rooms.get(id).cloned()
    }

    /// Look up a pending invite.
    pub fn invite_by_id(&self, id: &InviteId) -> Option<PendingInvite> {
        sync::lock(&self.state).invites.get(id).cloned()
    }

    /// All users, sorted by name.
    pub fn list_users(&self) -> Vec<User> {
        let mut users: Vec<User> = sync::lock(&self.state).users.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        users
    }

    /// All rooms, sorted by name.
    pub fn list_rooms(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = sync::lock(&self.state).rooms.values().cloned().collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        rooms
    }

    /// Point-in-time copy of all state.
    pub fn snapshot(&self) -> DirectorySnapshot {
        let state = sync::lock(&self.state);
        let mut snapshot = DirectorySnapshot {
            users: state.users.values().cloned().collect(),
            rooms: state.rooms.values().cloned().collect(),
            invites: state.invites.values().cloned().collect(),
        };
        drop(state);

        snapshot.users.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot.rooms.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot.invites.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot
    }
}
