use super::messages::escape_like;
use super::Store;
use crate::audit::{ReplyEntry, ReplyLog, ReplyStatus};
use parley_core::config::MemoryConfig;
use parley_core::error::ParleyError;
use parley_core::message::{MessageKind, StoredMessage};
use parley_core::traits::{AnsweredStore, MessageStore};

async fn test_store() -> Store {
    Store::in_memory().await.unwrap()
}

fn msg(id: &str, chat_id: &str, body: &str, timestamp: i64) -> StoredMessage {
    StoredMessage {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        author_id: "alice@c.us".to_string(),
        author_name: "Alice".to_string(),
        body: body.to_string(),
        timestamp,
        is_group: false,
        group_name: None,
        message_type: MessageKind::Text,
        is_ai_generated: false,
    }
}

#[tokio::test]
async fn test_upsert_same_id_keeps_one_row_with_latest_body() {
    let store = test_store().await;
    store.upsert_message(&msg("m1", "c1", "first", 1_000)).await.unwrap();
    store.upsert_message(&msg("m1", "c1", "second", 1_000)).await.unwrap();

    assert_eq!(store.message_count(Some("c1")).await.unwrap(), 1);
    let stored = store.get_message("m1").await.unwrap().unwrap();
    assert_eq!(stored.body, "second");
    assert!(!stored.is_ai_generated);
}

#[tokio::test]
async fn test_recent_messages_newest_first_and_bounded() {
    let store = test_store().await;
    for i in 0..30 {
        store
            .upsert_message(&msg(&format!("m{i}"), "c1", &format!("body {i}"), i * 1_000))
            .await
            .unwrap();
    }
    store.upsert_message(&msg("other", "c2", "elsewhere", 99_000)).await.unwrap();

    let recent = store.recent_messages("c1", 20).await.unwrap();
    assert_eq!(recent.len(), 20);
    assert_eq!(recent[0].id, "m29");
    assert_eq!(recent[19].id, "m10");
    assert!(recent.iter().all(|m| m.chat_id == "c1"));
}

#[tokio::test]
async fn test_recent_messages_empty_chat() {
    let store = test_store().await;
    assert!(store.recent_messages("nobody", 20).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_group_fields_round_trip() {
    let store = test_store().await;
    let mut m = msg("g1", "group@g.us", "hi team", 5_000);
    m.is_group = true;
    m.group_name = Some("Team".into());
    m.message_type = MessageKind::Other("image".into());
    store.upsert_message(&m).await.unwrap();

    let stored = store.get_message("g1").await.unwrap().unwrap();
    assert_eq!(stored, m);
}

#[tokio::test]
async fn test_chat_upsert_is_idempotent_and_updates_name() {
    let store = test_store().await;
    store.upsert_chat("c1", "Alice", false).await.unwrap();
    store.upsert_chat("c1", "Alice", false).await.unwrap();
    store.upsert_chat("c1", "Alice S.", false).await.unwrap();

    let chats = store.list_chats().await.unwrap();
    assert_eq!(chats.len(), 1);
    let chat = store.get_chat("c1").await.unwrap().unwrap();
    assert_eq!(chat.name, "Alice S.");
    assert!(!chat.is_group);
    assert!(chat.last_message_at.is_some());
    assert!(store.get_chat("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_search_messages_scoped_and_literal() {
    let store = test_store().await;
    store.upsert_message(&msg("a", "c1", "lunch at noon", 1)).await.unwrap();
    store.upsert_message(&msg("b", "c2", "lunch tomorrow?", 2)).await.unwrap();
    store.upsert_message(&msg("c", "c1", "100% sure", 3)).await.unwrap();
    store.upsert_message(&msg("d", "c1", "100 percent", 4)).await.unwrap();

    let all = store.search_messages("lunch", None, 10).await.unwrap();
    assert_eq!(all.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["b", "a"]);

    let scoped = store.search_messages("lunch", Some("c1"), 10).await.unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].id, "a");

    let literal = store.search_messages("100%", None, 10).await.unwrap();
    assert_eq!(literal.len(), 1);
    assert_eq!(literal[0].id, "c");
}

#[test]
fn test_escape_like() {
    assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    assert_eq!(escape_like("plain"), "plain");
}

#[tokio::test]
async fn test_embedding_survives_reingestion() {
    let store = test_store().await;
    store.upsert_message(&msg("m1", "c1", "hello", 1)).await.unwrap();
    assert!(store.get_embedding("m1").await.unwrap().is_none());

    store.set_embedding("m1", &[0.5, -1.25, 3.0]).await.unwrap();
    store.upsert_message(&msg("m1", "c1", "hello again", 1)).await.unwrap();

    assert_eq!(
        store.get_embedding("m1").await.unwrap(),
        Some(vec![0.5, -1.25, 3.0])
    );
}

#[tokio::test]
async fn test_persisted_answered_set() {
    let store = test_store().await;
    assert!(!store.contains("m1").await.unwrap());
    assert!(store.insert("m1").await.unwrap());
    assert!(!store.insert("m1").await.unwrap());
    assert!(store.contains("m1").await.unwrap());
    assert!(!store.contains("m2").await.unwrap());
}

#[tokio::test]
async fn test_reply_log_records_statuses() {
    let store = test_store().await;
    let log = ReplyLog::new(store.pool().clone());
    for status in [ReplyStatus::SendFailed, ReplyStatus::Fallback] {
        log.log(&ReplyEntry {
            message_id: "m1".into(),
            chat_id: "c1".into(),
            author_name: Some("Alice".into()),
            input_text: "hello".into(),
            output_text: Some("hi".into()),
            provider_used: Some("gemini".into()),
            model: None,
            processing_ms: Some(12),
            status,
            detail: None,
        })
        .await
        .unwrap();
    }

    assert_eq!(
        log.statuses_for("m1").await.unwrap(),
        vec!["send_failed", "fallback"]
    );
    let totals = log.totals().await.unwrap();
    assert_eq!(
        totals,
        vec![("fallback".to_string(), 1), ("send_failed".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_migrations_are_rerunnable() {
    let store = test_store().await;
    Store::run_migrations(&store.pool).await.unwrap();
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
        .fetch_one(&store.pool)
        .await
        .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn test_unsupported_backend_rejected() {
    let config = MemoryConfig {
        backend: "postgres".into(),
        ..MemoryConfig::default()
    };
    let err = Store::new(&config).await.err().unwrap();
    assert!(matches!(err, ParleyError::Config(_)));
}

#[tokio::test]
async fn test_db_size_nonzero() {
    let store = test_store().await;
    assert!(store.db_size().await.unwrap() > 0);
}
