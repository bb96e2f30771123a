//! Outbound replies.

use super::{telegram_message_id, TelegramChannel};
use parley_core::error::ParleyError;
use tracing::debug;

/// Telegram's maximum message length.
pub(crate) const MAX_MESSAGE_LEN: usize = 4096;

impl TelegramChannel {
    /// Send plain text to a chat, quoting `reply_to` on the first chunk.
    pub(super) async fn send_text(
        &self,
        chat_id: i64,
        reply_to: Option<i64>,
        text: &str,
    ) -> Result<(), ParleyError> {
        let url = format!("{}/sendMessage", self.base_url);

        for (i, chunk) in split_message(text, MAX_MESSAGE_LEN).into_iter().enumerate() {
            let mut body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if let (0, Some(reply_to)) = (i, reply_to) {
                body["reply_to_message_id"] = serde_json::json!(reply_to);
                body["allow_sending_without_reply"] = serde_json::json!(true);
            }

            let resp = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| ParleyError::Channel(format!("telegram send failed: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let error_text = resp.text().await.unwrap_or_default();
                return Err(ParleyError::Channel(format!(
                    "telegram send got {status}: {error_text}"
                )));
            }
            debug!("telegram: sent chunk {} to {chat_id}", i + 1);
        }

        Ok(())
    }

    /// Parse the reply target into Telegram ids.
    pub(super) fn parse_target(
        chat_id: &str,
        message_id: &str,
    ) -> Result<(i64, Option<i64>), ParleyError> {
        let chat: i64 = chat_id.parse().map_err(|e| {
            ParleyError::Channel(format!("invalid telegram chat_id '{chat_id}': {e}"))
        })?;
        Ok((chat, telegram_message_id(message_id)))
    }
}

/// Split a long message into chunks of at most `max_len` bytes, preferring
/// newline boundaries and never splitting a UTF-8 character.
pub(crate) fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let break_at = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .map(|i| start + i + 1)
                .unwrap_or(end)
        } else {
            end
        };
        chunks.push(&text[start..break_at]);
        start = break_at;
    }

    chunks
}
