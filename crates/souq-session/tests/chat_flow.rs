//! End-to-end flow over the public API: seed a store from a JSON
//! fixture, browse the inbox, chat in a session, and verify a second
//! session observes the writes on its next load.

use std::sync::Arc;

use souq_session::{ChatSession, Inbox, InboxFilter, Phase};
use souq_store::{ChatStore, NoDelay, seed};
use souq_types::events::SessionEvent;
use souq_types::models::UserContext;

const FIXTURE: &str = r#"[
    {
        "id": 1,
        "chat_id": "bike-sale",
        "sender_id": "user-bike-sale",
        "content": "Hi! Is the city bike still available?",
        "type": "text",
        "timestamp": "2024-03-01T09:00:00Z",
        "is_read": true
    },
    {
        "id": 2,
        "chat_id": "bike-sale",
        "sender_id": "current-user",
        "content": "It is. Want to see it this week?",
        "type": "text",
        "timestamp": "2024-03-01T09:04:00Z",
        "is_read": true
    },
    {
        "id": 3,
        "chat_id": "lamp-sale",
        "sender_id": "user-lamp-sale",
        "content": "Would you take 15 for the lamp?",
        "type": "text",
        "timestamp": "2024-03-02T18:30:00Z"
    }
]"#;

fn me() -> UserContext {
    UserContext::new("current-user")
}

fn seeded_store() -> Arc<ChatStore> {
    let messages = seed::from_json(FIXTURE).expect("fixture parses");
    Arc::new(ChatStore::with_seed(Arc::new(NoDelay), me(), messages))
}

#[tokio::test]
async fn inbox_reflects_seeded_conversations() {
    let store = seeded_store();
    let mut inbox = Inbox::new(store);
    inbox.load().await;

    assert_eq!(*inbox.phase(), Phase::Ready);
    let all = inbox.visible("", InboxFilter::All);
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].chat_id, "bike-sale");
    assert_eq!(all[1].chat_id, "lamp-sale");
    assert_eq!(
        all[0].last_message.as_ref().unwrap().content,
        "It is. Want to see it this week?"
    );

    // Only the lamp chat has unread traffic.
    assert_eq!(all[0].unread_count, 0);
    let unread = inbox.visible("", InboxFilter::Unread);
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].chat_id, "lamp-sale");
}

#[tokio::test]
async fn session_loads_history_and_sends() {
    let store = seeded_store();
    let (mut session, mut rx) = ChatSession::open(store.clone(), "bike-sale", me());

    session.load_history().await;
    assert_eq!(*session.phase(), Phase::Ready);
    assert_eq!(session.history().len(), 2);
    assert_eq!(rx.try_recv().unwrap(), SessionEvent::HistoryChanged { len: 2 });

    session.set_input("Thursday evening works for me");
    session.submit().await;
    assert_eq!(session.history().len(), 3);
    assert_eq!(rx.try_recv().unwrap(), SessionEvent::HistoryChanged { len: 3 });

    // History stays timestamp-ascending after the send.
    let history = session.history();
    assert!(
        history
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    );

    // The index snapshot followed the append.
    let conv = store
        .conversation_for_chat("bike-sale")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        conv.last_message.unwrap().content,
        "Thursday evening works for me"
    );
}

#[tokio::test]
async fn second_session_sees_writes_on_next_load() {
    let store = seeded_store();
    let (mut buyer_view, _rx_a) = ChatSession::open(store.clone(), "lamp-sale", me());
    let (mut other_view, _rx_b) = ChatSession::open(store.clone(), "lamp-sale", me());

    buyer_view.load_history().await;
    other_view.load_history().await;
    assert_eq!(other_view.history().len(), 1);

    buyer_view.send("Deal, 15 it is").await;

    // No push between sessions; the other view catches up on re-fetch.
    assert_eq!(other_view.history().len(), 1);
    other_view.load_history().await;
    assert_eq!(other_view.history().len(), 2);
}

#[tokio::test]
async fn starting_a_brand_new_chat_creates_its_conversation() {
    let store = seeded_store();
    let (mut session, _rx) = ChatSession::open(store.clone(), "desk-sale", me());

    // A chat with no messages yet is valid, not missing.
    session.load_history().await;
    assert_eq!(*session.phase(), Phase::Ready);
    assert!(session.history().is_empty());
    assert!(
        store
            .conversation_for_chat("desk-sale")
            .await
            .unwrap()
            .is_none()
    );

    session.send("Hi, about the standing desk...").await;

    let conv = store
        .conversation_for_chat("desk-sale")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conv.participants, ["current-user", "user-desk-sale"]);
    assert_eq!(conv.unread_count, 1);

    let mut inbox = Inbox::new(store);
    inbox.load().await;
    assert_eq!(inbox.visible("", InboxFilter::All).len(), 3);
}
