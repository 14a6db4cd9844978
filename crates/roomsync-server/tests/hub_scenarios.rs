//! End-to-end flows through the hub with recording connections.

use std::sync::Arc;

use roomsync_core::{EventKind, RoomId, UserId};
use roomsync_harness::{InvariantRegistry, RecordingSink, SimEnv, SystemSnapshot};
use roomsync_server::{DirectoryError, Hub, HubConfig, HubError, SyncCursor};
use serde_json::json;

fn hub() -> Arc<Hub<SimEnv>> {
    Arc::new(Hub::new(SimEnv::new(), HubConfig::default()))
}

fn register(hub: &Hub<SimEnv>, name: &str) -> UserId {
    hub.register_user(name).unwrap().id
}

/// A and B share a fresh room created from an invite.
fn paired(hub: &Hub<SimEnv>) -> (UserId, UserId, RoomId) {
    let a = register(hub, "Alice");
    let b = register(hub, "Bob");
    let invite = hub.invite(&a, &b, "").unwrap().invite;
    let room = hub.accept_invite(&invite.id, &b).unwrap().id;
    (a, b, room)
}

fn assert_invariants(hub: &Hub<SimEnv>) {
    let result = InvariantRegistry::standard().check_all(&SystemSnapshot::capture(hub));
    assert!(result.is_ok(), "{result:?}");
}

#[test]
fn chat_is_pushed_and_recoverable_through_diff() {
    let hub = hub();
    let (a, b, room) = paired(&hub);

    let sink_a = RecordingSink::new();
    let sink_b = RecordingSink::new();
    hub.connect(&a, sink_a.clone());
    hub.connect(&b, sink_b.clone());

    let op = hub.send_chat(&a, &room, "hi").unwrap();

    let pushed = sink_b.envelopes(EventKind::ChatMessage);
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].data["message"], "hi");
    assert_eq!(pushed[0].data["userId"], json!(a));
    assert!(!sink_a.received(EventKind::ChatMessage));

    // C joins later through an invite and is never connected
    let c = register(&hub, "Carol");
    let invite = hub.invite(&a, &c, "").unwrap();
    assert!(!invite.delivered);
    hub.accept_invite(&invite.invite.id, &c).unwrap();

    let first = hub.operations_since(&c, &room, &SyncCursor::from_parts(None, Some(""))).unwrap();
    assert_eq!(first, vec![op.clone()]);

    let cursor = SyncCursor::from_parts(None, Some(&op.hash));
    assert!(hub.operations_since(&c, &room, &cursor).unwrap().is_empty());

    assert_invariants(&hub);
}

#[test]
fn fresh_invite_creates_room_with_both_parties() {
    let hub = hub();
    let a = register(&hub, "Alice");
    let b = register(&hub, "Bob");
    let sink_a = RecordingSink::new();
    let sink_b = RecordingSink::new();
    hub.connect(&a, sink_a.clone());
    hub.connect(&b, sink_b.clone());

    let receipt = hub.invite(&a, &b, "").unwrap();
    assert!(receipt.delivered);
    let invited = sink_b.envelopes(EventKind::UserInvited);
    assert_eq!(invited[0].data["message"], "Hi, it's me, Alice.");

    let room = hub.accept_invite(&receipt.invite.id, &b).unwrap();
    assert_eq!(room.approved_user_ids, vec![a.clone(), b.clone()]);
    assert_eq!(room.member_ids, vec![a.clone(), b.clone()]);
    assert_eq!(hub.directory().user(&a).unwrap().room_id, Some(room.id.clone()));
    assert_eq!(hub.directory().user(&b).unwrap().room_id, Some(room.id.clone()));

    let joined_for = |sink: &RecordingSink, user: &UserId| {
        sink.envelopes(EventKind::UserJoined).iter().any(|e| e.data["userId"] == json!(user))
    };
    assert!(joined_for(&sink_a, &b));
    assert!(joined_for(&sink_b, &a));

    // Single use
    assert_eq!(
        hub.accept_invite(&receipt.invite.id, &b),
        Err(HubError::Directory(DirectoryError::InviteNotFound(receipt.invite.id)))
    );
    assert_invariants(&hub);
}

#[test]
fn last_departure_deletes_room() {
    let hub = hub();
    let (a, b, room) = paired(&hub);
    hub.send_chat(&a, &room, "bye").unwrap();

    let sink_a = RecordingSink::new();
    let sink_b = RecordingSink::new();
    hub.connect(&a, sink_a.clone());
    hub.connect(&b, sink_b.clone());

    let outcome = hub.leave_room(&a).unwrap();
    assert!(outcome.room_deleted);
    assert_eq!(outcome.new_owner, Some(b.clone()));

    assert!(hub.directory().room(&room).is_none());
    assert_eq!(hub.directory().user(&b).unwrap().room_id, None);
    assert!(hub.history().is_empty(&room));

    assert_eq!(sink_b.envelopes(EventKind::RoomDeleted).len(), 1);
    assert!(!sink_a.received(EventKind::RoomDeleted));
    assert_invariants(&hub);
}

#[test]
fn broken_connection_does_not_block_others() {
    let hub = hub();
    let users: Vec<UserId> =
        ["Ann", "Ben", "Cat"].iter().map(|name| register(&hub, name)).collect();
    let sinks: Vec<RecordingSink> = users
        .iter()
        .map(|user| {
            let sink = RecordingSink::new();
            hub.connect(user, sink.clone());
            sink
        })
        .collect();

    sinks[1].fail();
    let report = hub.distributor().multicast(&users, EventKind::Heartbeat, &json!({}), None);

    assert_eq!(report.delivered, vec![users[0].clone(), users[2].clone()]);
    assert_eq!(report.failed_users(), vec![users[1].clone()]);
    assert!(sinks[0].received(EventKind::Heartbeat));
    assert!(sinks[2].received(EventKind::Heartbeat));
    assert!(!hub.distributor().is_connected(&users[1]));
    assert!(hub.distributor().is_connected(&users[0]));
}

#[test]
fn outsiders_are_refused_without_side_effects() {
    let hub = hub();
    let (a, _, room) = paired(&hub);
    let c = register(&hub, "Carol");

    let not_member =
        HubError::Directory(DirectoryError::NotMember { user: c.clone(), room: room.clone() });
    assert_eq!(hub.send_chat(&c, &room, "let me in"), Err(not_member.clone()));
    assert_eq!(hub.chat_history(&c, &room), Err(not_member));
    assert!(hub.history().is_empty(&room));

    // Permissioned room: joining needs the owner's approval
    assert!(matches!(
        hub.join_room(&c, &room),
        Err(HubError::Directory(DirectoryError::PermissionDenied(_)))
    ));

    let sink_a = RecordingSink::new();
    hub.connect(&a, sink_a.clone());
    hub.request_join(&c, &room).unwrap();
    assert!(sink_a.received(EventKind::JoinRequest));
    assert!(!hub.directory().room(&room).unwrap().has_member(&c));

    let joined = hub.approve_join(&a, &c, &room).unwrap();
    assert!(joined.has_member(&c));
    assert_invariants(&hub);
}

#[test]
fn expired_invite_is_refused() {
    let env = SimEnv::new();
    let hub = Hub::new(env.clone(), HubConfig::default());
    let a = register(&hub, "Alice");
    let b = register(&hub, "Bob");
    let invite = hub.invite(&a, &b, "").unwrap().invite;

    env.advance(std::time::Duration::from_secs(31));

    assert_eq!(
        hub.accept_invite(&invite.id, &b),
        Err(HubError::Directory(DirectoryError::InviteExpired(invite.id.clone())))
    );
    assert!(hub.directory().invite_by_id(&invite.id).is_none());
    assert_eq!(hub.directory().user(&b).unwrap().room_id, None);
}

#[test]
fn disconnect_leaves_room_and_announces_offline() {
    let hub = hub();
    let (a, b, room) = paired(&hub);
    let c = register(&hub, "Carol");

    let sink_b = RecordingSink::new();
    let sink_c = RecordingSink::new();
    let handle_a = hub.connect(&a, RecordingSink::new());
    hub.connect(&b, sink_b.clone());
    hub.connect(&c, sink_c.clone());

    hub.disconnect(&handle_a);

    assert!(!hub.directory().user(&a).unwrap().is_online);
    assert!(hub.directory().room(&room).is_none());
    assert!(sink_b.received(EventKind::UserLeft));
    assert!(sink_b.received(EventKind::RoomDeleted));

    let offline = sink_c.envelopes(EventKind::UserOffline);
    assert_eq!(offline.len(), 1);
    assert_eq!(offline[0].data["userId"], json!(a));
    assert_invariants(&hub);
}
