//! Chat records: upsert and listing.

use super::Store;
use chrono::{DateTime, NaiveDateTime, Utc};
use parley_core::{error::ParleyError, message::ChatRecord};

type ChatRow = (String, Option<String>, bool, Option<String>);

impl Store {
    /// Insert or refresh a chat. Name and kind follow the latest event;
    /// `last_message_at` is bumped to now.
    pub async fn store_chat(
        &self,
        id: &str,
        name: &str,
        is_group: bool,
    ) -> Result<(), ParleyError> {
        sqlx::query(
            "INSERT INTO chats (id, name, is_group, last_message_at) \
             VALUES (?, ?, ?, datetime('now')) \
             ON CONFLICT(id) DO UPDATE SET \
             name = excluded.name, is_group = excluded.is_group, \
             last_message_at = excluded.last_message_at",
        )
        .bind(id)
        .bind(name)
        .bind(is_group)
        .execute(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("chat upsert failed: {e}")))?;

        Ok(())
    }

    /// Look up a single chat.
    pub async fn chat(&self, id: &str) -> Result<Option<ChatRecord>, ParleyError> {
        let row: Option<ChatRow> = sqlx::query_as(
            "SELECT id, name, is_group, last_message_at FROM chats WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))?;

        Ok(row.map(chat_from_row))
    }

    /// All known chats, most recently active first.
    pub async fn list_chats(&self) -> Result<Vec<ChatRecord>, ParleyError> {
        let rows: Vec<ChatRow> = sqlx::query_as(
            "SELECT id, name, is_group, last_message_at FROM chats \
             ORDER BY last_message_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))?;

        Ok(rows.into_iter().map(chat_from_row).collect())
    }
}

fn chat_from_row((id, name, is_group, last_message_at): ChatRow) -> ChatRecord {
    ChatRecord {
        id,
        name: name.unwrap_or_default(),
        is_group,
        last_message_at: last_message_at.as_deref().and_then(parse_sqlite_datetime),
    }
}

/// Parse SQLite's `datetime('now')` format (`YYYY-MM-DD HH:MM:SS`, UTC).
fn parse_sqlite_datetime(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
