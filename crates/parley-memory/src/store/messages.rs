//! Message storage, recent history, lookup, search, and enrichment.

use super::Store;
use async_trait::async_trait;
use parley_core::{
    error::ParleyError,
    message::{ChatRecord, MessageKind, StoredMessage},
    traits::MessageStore,
};

type MessageRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    i64,
    bool,
    Option<String>,
    String,
    bool,
);

const MESSAGE_COLUMNS: &str = "id, chat_id, author_id, author_name, body, timestamp, \
                               is_group, group_name, message_type, is_ai_generated";

impl Store {
    /// Insert a message, or overwrite the row with the same id.
    ///
    /// The `embedding` column is left untouched on conflict.
    pub async fn store_message(&self, message: &StoredMessage) -> Result<(), ParleyError> {
        sqlx::query(
            "INSERT INTO messages \
             (id, chat_id, author_id, author_name, body, timestamp, is_group, \
              group_name, message_type, is_ai_generated) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             chat_id = excluded.chat_id, author_id = excluded.author_id, \
             author_name = excluded.author_name, body = excluded.body, \
             timestamp = excluded.timestamp, is_group = excluded.is_group, \
             group_name = excluded.group_name, message_type = excluded.message_type, \
             is_ai_generated = excluded.is_ai_generated",
        )
        .bind(&message.id)
        .bind(&message.chat_id)
        .bind(&message.author_id)
        .bind(&message.author_name)
        .bind(&message.body)
        .bind(message.timestamp)
        .bind(message.is_group)
        .bind(&message.group_name)
        .bind(message.message_type.as_tag())
        .bind(message.is_ai_generated)
        .execute(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("message upsert failed: {e}")))?;

        Ok(())
    }

    /// Up to `limit` messages of a chat, newest first.
    pub async fn get_recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, ParleyError> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE chat_id = ? ORDER BY timestamp DESC LIMIT ?"
        ))
        .bind(chat_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))?;

        Ok(rows.into_iter().map(message_from_row).collect())
    }

    /// Point lookup by message id.
    pub async fn get_message(&self, id: &str) -> Result<Option<StoredMessage>, ParleyError> {
        let row: Option<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))?;

        Ok(row.map(message_from_row))
    }

    /// Substring search over message bodies, newest first, optionally
    /// scoped to one chat.
    pub async fn search_messages(
        &self,
        query: &str,
        chat_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, ParleyError> {
        let pattern = format!("%{}%", escape_like(query));

        let rows: Vec<MessageRow> = match chat_id {
            Some(chat_id) => sqlx::query_as(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages \
                 WHERE chat_id = ? AND body LIKE ? ESCAPE '\\' \
                 ORDER BY timestamp DESC LIMIT ?"
            ))
            .bind(chat_id)
            .bind(&pattern)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query_as(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages \
                 WHERE body LIKE ? ESCAPE '\\' \
                 ORDER BY timestamp DESC LIMIT ?"
            ))
            .bind(&pattern)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(|e| ParleyError::Memory(format!("search failed: {e}")))?;

        Ok(rows.into_iter().map(message_from_row).collect())
    }

    /// Attach an embedding vector to a stored message.
    ///
    /// Enrichment only; reply decisions never read it.
    pub async fn set_embedding(
        &self,
        message_id: &str,
        embedding: &[f32],
    ) -> Result<(), ParleyError> {
        let bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
        sqlx::query("UPDATE messages SET embedding = ? WHERE id = ?")
            .bind(bytes)
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ParleyError::Memory(format!("embedding update failed: {e}")))?;
        Ok(())
    }

    /// Read back a message's embedding, if one was attached.
    pub async fn get_embedding(&self, message_id: &str) -> Result<Option<Vec<f32>>, ParleyError> {
        let row: Option<(Option<Vec<u8>>,)> =
            sqlx::query_as("SELECT embedding FROM messages WHERE id = ?")
                .bind(message_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))?;

        Ok(row.and_then(|(blob,)| blob).map(|bytes| {
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        }))
    }

    /// Number of stored messages, optionally for one chat.
    pub async fn message_count(&self, chat_id: Option<&str>) -> Result<i64, ParleyError> {
        let (count,): (i64,) = match chat_id {
            Some(chat_id) => {
                sqlx::query_as("SELECT COUNT(*) FROM messages WHERE chat_id = ?")
                    .bind(chat_id)
                    .fetch_one(&self.pool)
                    .await
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM messages")
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .map_err(|e| ParleyError::Memory(format!("count failed: {e}")))?;

        Ok(count)
    }
}

#[async_trait]
impl MessageStore for Store {
    async fn upsert_chat(&self, id: &str, name: &str, is_group: bool) -> Result<(), ParleyError> {
        self.store_chat(id, name, is_group).await
    }

    async fn upsert_message(&self, message: &StoredMessage) -> Result<(), ParleyError> {
        self.store_message(message).await
    }

    async fn recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, ParleyError> {
        self.get_recent_messages(chat_id, limit).await
    }

    async fn get_chat(&self, id: &str) -> Result<Option<ChatRecord>, ParleyError> {
        self.chat(id).await
    }
}

fn message_from_row(row: MessageRow) -> StoredMessage {
    let (
        id,
        chat_id,
        author_id,
        author_name,
        body,
        timestamp,
        is_group,
        group_name,
        message_type,
        is_ai_generated,
    ) = row;
    StoredMessage {
        id,
        chat_id,
        author_id,
        author_name: author_name.unwrap_or_default(),
        body,
        timestamp,
        is_group,
        group_name,
        message_type: MessageKind::from_tag(&message_type),
        is_ai_generated,
    }
}

/// Escape `LIKE` wildcards so the query matches literally.
pub(super) fn escape_like(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
