//! Property-based tests for HistoryPool.

use std::sync::Arc;

use proptest::prelude::*;
use roomsync_core::{
    ChatMessage, ClipboardItem, ClipboardKind, Item, OpType, RoomId, UserId, verify_chain,
};
use roomsync_harness::SimEnv;
use roomsync_server::{HistoryLimits, HistoryPool, SyncCursor};

#[derive(Debug, Clone)]
enum Entry {
    Chat { id: u8, message: String, timestamp: u64 },
    Clip { id: u8, text: String },
    Remove { id: u8 },
}

fn entry() -> impl Strategy<Value = Entry> {
    prop_oneof![
        4 => (0u8..8, "[a-z ]{0,12}", 0u64..20)
            .prop_map(|(id, message, timestamp)| Entry::Chat { id, message, timestamp }),
        3 => (0u8..8, "[a-z]{0,12}").prop_map(|(id, text)| Entry::Clip { id, text }),
        1 => (0u8..8).prop_map(|id| Entry::Remove { id }),
    ]
}

fn item(entry: &Entry) -> (OpType, Item) {
    match entry {
        Entry::Chat { id, message, timestamp } => (
            OpType::Add,
            Item::Chat(ChatMessage {
                id: format!("msg_{id}"),
                room_id: "room_1".into(),
                user_id: "user_1".into(),
                user_name: "Alice".into(),
                message: message.clone(),
                timestamp: *timestamp,
            }),
        ),
        Entry::Clip { id, text } => (OpType::Add, clip(*id, text)),
        Entry::Remove { id } => (OpType::Remove, clip(*id, "")),
    }
}

fn clip(id: u8, text: &str) -> Item {
    Item::Clipboard(ClipboardItem {
        id: format!("clip_{id}"),
        kind: ClipboardKind::Text,
        text: text.into(),
        image: Vec::new(),
        files: Vec::new(),
        archive: None,
    })
}

fn pool(max_operations_per_room: usize) -> HistoryPool<SimEnv> {
    HistoryPool::new(
        SimEnv::new(),
        HistoryLimits { max_operations_per_room, max_chat_messages: 5 },
    )
}

fn append_all(pool: &HistoryPool<SimEnv>, room: &RoomId, entries: &[Entry]) {
    let actor = UserId::from("user_1");
    for entry in entries {
        let (op_type, item) = item(entry);
        pool.append(room, op_type, Arc::new(item), &actor, "Alice");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: the log keeps exactly the most recent `cap` operations
    #[test]
    fn prop_trim_keeps_most_recent(cap in 1usize..20, extra in 0usize..30) {
        let pool = pool(cap);
        let room = RoomId::from("room_1");
        let total = cap + extra;

        let entries: Vec<Entry> = (0..total)
            .map(|i| Entry::Clip { id: (i % 8) as u8, text: i.to_string() })
            .collect();
        append_all(&pool, &room, &entries);

        let ops = pool.diff_since(&room, &SyncCursor::Start);
        prop_assert_eq!(ops.len(), cap);
        prop_assert_eq!(ops.first().map(|op| op.id), Some((extra + 1) as u64));
        prop_assert_eq!(ops.last().map(|op| op.id), Some(total as u64));
        prop_assert!(verify_chain(&ops).is_ok());
    }

    /// Property: replaying the same sequence yields the same projections
    #[test]
    fn prop_projection_is_deterministic(entries in proptest::collection::vec(entry(), 0..40)) {
        let room = RoomId::from("room_1");
        let first = pool(1000);
        let second = pool(1000);
        append_all(&first, &room, &entries);
        append_all(&second, &room, &entries);

        prop_assert_eq!(first.project_chat(&room), second.project_chat(&room));
        prop_assert_eq!(first.project_clipboard(&room), second.project_clipboard(&room));
        prop_assert_eq!(first.project_chat(&room), first.project_chat(&room));
    }

    /// Property: chat projection is sorted, capped and has unique ids
    #[test]
    fn prop_chat_projection_is_sorted_and_capped(
        entries in proptest::collection::vec(entry(), 0..40)
    ) {
        let room = RoomId::from("room_1");
        let pool = pool(1000);
        append_all(&pool, &room, &entries);

        let chat = pool.project_chat(&room);
        prop_assert!(chat.len() <= 5);
        prop_assert!(chat.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        let mut ids: Vec<_> = chat.iter().map(|m| m.id.clone()).collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), chat.len());
    }

    /// Property: an unknown hash resyncs fully, an unknown id yields nothing
    #[test]
    fn prop_unknown_cursor_semantics(
        entries in proptest::collection::vec(entry(), 1..20),
        bogus in "[0-9a-f]{8}",
    ) {
        let room = RoomId::from("room_1");
        let pool = pool(1000);
        append_all(&pool, &room, &entries);

        let full = pool.diff_since(&room, &SyncCursor::Start);
        prop_assert_eq!(pool.diff_since(&room, &SyncCursor::Hash(bogus)), full.clone());
        prop_assert!(pool.diff_since(&room, &SyncCursor::Id(9_999)).is_empty());

        // Known cursors return exactly the tail
        let mid = &full[full.len() / 2];
        let by_hash = pool.diff_since(&room, &SyncCursor::Hash(mid.hash.clone()));
        let by_id = pool.diff_since(&room, &SyncCursor::Id(mid.id));
        prop_assert_eq!(&by_hash, &by_id);
        prop_assert_eq!(by_hash.len(), full.len() - full.len() / 2 - 1);
    }

    /// Property: appends to one room never touch another room's chain
    #[test]
    fn prop_rooms_are_independent(
        left in proptest::collection::vec(entry(), 1..15),
        right in proptest::collection::vec(entry(), 1..15),
    ) {
        let pool = pool(1000);
        let a = RoomId::from("room_a");
        let b = RoomId::from("room_b");
        append_all(&pool, &a, &left);
        append_all(&pool, &b, &right);

        prop_assert_eq!(pool.len(&a), left.len());
        prop_assert_eq!(pool.len(&b), right.len());
        prop_assert_eq!(pool.operation(&a, 1).map(|op| op.parent_hash), Some(String::new()));
        prop_assert_eq!(pool.operation(&b, 1).map(|op| op.parent_hash), Some(String::new()));
    }
}

#[test]
fn trimmed_hash_triggers_full_resync() {
    let pool = pool(3);
    let room = RoomId::from("room_1");
    let entries: Vec<Entry> =
        (0..5).map(|i| Entry::Clip { id: i, text: format!("t{i}") }).collect();

    append_all(&pool, &room, &entries[..1]);
    let early = pool.diff_since(&room, &SyncCursor::Start)[0].clone();
    append_all(&pool, &room, &entries[1..]);

    let resync = pool.diff_since(&room, &SyncCursor::Hash(early.hash));
    assert_eq!(resync.len(), 3);
    assert_eq!(resync[0].id, 3);
}
