//! Persisted answered-message set.

use super::Store;
use async_trait::async_trait;
use parley_core::{error::ParleyError, traits::AnsweredStore};

#[async_trait]
impl AnsweredStore for Store {
    async fn contains(&self, message_id: &str) -> Result<bool, ParleyError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT message_id FROM answered_messages WHERE message_id = ?")
                .bind(message_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ParleyError::Memory(format!("query failed: {e}")))?;
        Ok(row.is_some())
    }

    async fn insert(&self, message_id: &str) -> Result<bool, ParleyError> {
        let result = sqlx::query("INSERT OR IGNORE INTO answered_messages (message_id) VALUES (?)")
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ParleyError::Memory(format!("answered insert failed: {e}")))?;
        Ok(result.rows_affected() == 1)
    }
}
