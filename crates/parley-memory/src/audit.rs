//! Reply log: records every automated reply attempt.

use parley_core::error::ParleyError;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// An entry to write to the reply log.
pub struct ReplyEntry {
    pub message_id: String,
    pub chat_id: String,
    pub author_name: Option<String>,
    pub input_text: String,
    pub output_text: Option<String>,
    pub provider_used: Option<String>,
    pub model: Option<String>,
    pub processing_ms: Option<i64>,
    pub status: ReplyStatus,
    pub detail: Option<String>,
}

/// Final state of a reply attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// Provider text delivered.
    Sent,
    /// Provider failed; the fallback text was delivered.
    Fallback,
    /// Transport refused the reply.
    SendFailed,
}

impl ReplyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Fallback => "fallback",
            Self::SendFailed => "send_failed",
        }
    }
}

/// Reply log backed by SQLite.
pub struct ReplyLog {
    pool: SqlitePool,
}

impl ReplyLog {
    /// Create a new reply log sharing the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write an entry to the reply log.
    pub async fn log(&self, entry: &ReplyEntry) -> Result<(), ParleyError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO reply_log \
             (id, message_id, chat_id, author_name, input_text, output_text, \
              provider_used, model, processing_ms, status, detail) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&entry.message_id)
        .bind(&entry.chat_id)
        .bind(&entry.author_name)
        .bind(&entry.input_text)
        .bind(&entry.output_text)
        .bind(&entry.provider_used)
        .bind(&entry.model)
        .bind(entry.processing_ms)
        .bind(entry.status.as_str())
        .bind(&entry.detail)
        .execute(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("reply log write failed: {e}")))?;

        debug!(
            "reply log: {} {} [{}] {}",
            entry.chat_id,
            entry.message_id,
            entry.status.as_str(),
            truncate(&entry.input_text, 80)
        );

        Ok(())
    }

    /// Statuses recorded for one message id, oldest first.
    pub async fn statuses_for(&self, message_id: &str) -> Result<Vec<String>, ParleyError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT status FROM reply_log WHERE message_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))?;

        Ok(rows.into_iter().map(|(s,)| s).collect())
    }

    /// Count of entries per status, for the status view.
    pub async fn totals(&self) -> Result<Vec<(String, i64)>, ParleyError> {
        sqlx::query_as("SELECT status, COUNT(*) FROM reply_log GROUP BY status ORDER BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))
    }
}

/// Truncate on a char boundary.
fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("héllo wörld", 4), "héll");
    }
}
