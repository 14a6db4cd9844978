//! Property tests for chain hashing and sanitization.

use std::sync::Arc;

use proptest::prelude::*;
use roomsync_core::{
    ChatMessage, HashInput, Item, OpType, Operation, UserId, chain_hash, sanitize, verify_chain,
};

fn chat(id: u64, message: &str, timestamp: u64) -> Item {
    Item::Chat(ChatMessage {
        id: format!("msg_{id}"),
        room_id: "room_1".into(),
        user_id: "user_1".into(),
        user_name: "Alice".into(),
        message: message.into(),
        timestamp,
    })
}

/// Build a linked chain the same way the log does.
fn build_chain(messages: &[(String, u64)]) -> Vec<Operation> {
    let user = UserId::from("user_1");
    let mut ops: Vec<Operation> = Vec::new();

    for (i, (message, timestamp)) in messages.iter().enumerate() {
        let id = i as u64 + 1;
        let item = chat(id, message, *timestamp);
        let parent_hash = ops.last().map(|op| op.hash.clone()).unwrap_or_default();
        let hashed = chain_hash(
            &parent_hash,
            &HashInput {
                op_type: OpType::Add,
                item_id: item.id(),
                item: item.fingerprint(),
                user_id: &user,
                user_name: "Alice",
                timestamp: *timestamp,
            },
        );

        ops.push(Operation {
            id,
            parent_id: ops.last().map(|op| op.id),
            hash: hashed.hash,
            parent_hash,
            op_type: OpType::Add,
            item_id: item.id().to_owned(),
            item: Arc::new(item),
            timestamp: *timestamp,
            user_id: user.clone(),
            user_name: "Alice".into(),
            fallback_hash: hashed.fallback,
        });
    }

    ops
}

proptest! {
    #[test]
    fn built_chains_verify(messages in prop::collection::vec((".{0,40}", 0u64..1_000_000), 1..30)) {
        let ops = build_chain(&messages);
        prop_assert!(verify_chain(&ops).is_ok());
        prop_assert!(ops.iter().all(|op| !op.fallback_hash));
    }

    #[test]
    fn any_suffix_still_verifies(
        messages in prop::collection::vec((".{0,20}", 0u64..1000), 2..30),
        cut in 0usize..30,
    ) {
        let ops = build_chain(&messages);
        let cut = cut % ops.len();
        prop_assert!(verify_chain(&ops[cut..]).is_ok());
    }

    #[test]
    fn tampering_breaks_the_chain(
        messages in prop::collection::vec((".{0,20}", 0u64..1000), 2..20),
        victim in 1usize..20,
    ) {
        let mut ops = build_chain(&messages);
        let victim = 1 + victim % (ops.len() - 1);
        ops[victim].parent_hash = "0".repeat(64);

        prop_assert!(verify_chain(&ops).is_err());
    }

    #[test]
    fn sanitized_text_respects_cap_and_is_idempotent(input in any::<String>(), cap in 1usize..64) {
        let once = sanitize::plain_text(&input, cap);
        prop_assert!(once.chars().count() <= cap);
        prop_assert!(!once.contains('\r'));

        let twice = sanitize::plain_text(&once, cap);
        prop_assert_eq!(twice, once.trim());
    }
}
