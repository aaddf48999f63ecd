//! Conversation store integration tests against an on-disk database,
//! including overlapping scheduler cycles racing for the same due rows.

use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use followcare_core::{ConversationStatus, ConversationStore, Turn};

fn open_store(dir: &tempfile::TempDir) -> ConversationStore {
    ConversationStore::open(dir.path().join("followcare.db")).unwrap()
}

#[test]
fn store_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let due = Utc::now() - Duration::minutes(5);
    {
        let store = open_store(&dir);
        store.create_scheduled("C1", "+100", due).unwrap();
        store
            .append_turns("C1", 0, &[Turn::assistant("hello"), Turn::user("hi")])
            .unwrap();
    }

    // A fresh process sees the same durable state.
    let store = open_store(&dir);
    let conversation = store.get("C1").unwrap().unwrap();
    assert_eq!(conversation.phone_number, "+100");
    assert_eq!(conversation.transcript.len(), 2);
    assert_eq!(conversation.revision, 1);

    let claimed = store.claim_due(Utc::now()).unwrap();
    assert_eq!(claimed.len(), 1);
}

#[test]
fn overlapping_claims_never_share_a_row() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = Arc::new(open_store(&dir));

    for i in 0..20 {
        store
            .create_scheduled(
                &format!("contact-{i}"),
                &format!("+{i}"),
                Utc::now() - Duration::minutes(1),
            )
            .unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || store.claim_due(Utc::now()).unwrap())
        })
        .collect();

    let mut claimed_ids: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .map(|c| c.contact_id)
        .collect();
    claimed_ids.sort();
    let total = claimed_ids.len();
    claimed_ids.dedup();

    // Every row claimed exactly once across all competing cycles.
    assert_eq!(total, 20);
    assert_eq!(claimed_ids.len(), 20);

    for id in claimed_ids {
        let conversation = store.get(&id).unwrap().unwrap();
        assert_eq!(conversation.status, ConversationStatus::Ongoing);
    }
}
