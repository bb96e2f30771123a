//! Long-polling update loop and Channel trait implementation.

use super::convert::to_inbound;
use super::types::{TgResponse, TgUpdate};
use super::TelegramChannel;
use async_trait::async_trait;
use parley_core::{
    error::ParleyError,
    message::{ReplyTarget, TransportEvent},
    traits::Channel,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<mpsc::Receiver<TransportEvent>, ParleyError> {
        if !self.is_configured() {
            return Err(ParleyError::Channel("telegram: no bot token configured".into()));
        }

        let identity = self.get_me().await?;
        let bot_id: Option<i64> = identity.id.parse().ok();

        let (tx, rx) = mpsc::channel(64);
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let last_update_id = self.last_update_id.clone();

        info!(
            "Telegram channel starting long polling as {}...",
            identity.user.as_deref().unwrap_or(&identity.id)
        );
        if tx.send(TransportEvent::Ready(identity)).await.is_err() {
            return Err(ParleyError::Channel("telegram: receiver dropped".into()));
        }

        let handle = tokio::spawn(async move {
            let mut backoff_secs: u64 = 1;

            loop {
                let last = last_update_id.lock().await;
                let offset = last.map(|id| id + 1);
                drop(last);

                let mut url = format!("{base_url}/getUpdates?timeout=30");
                if let Some(off) = offset {
                    url.push_str(&format!("&offset={off}"));
                }

                let resp = match client
                    .get(&url)
                    .timeout(Duration::from_secs(35))
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        error!("telegram poll error (retry in {backoff_secs}s): {e}");
                        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                        backoff_secs = (backoff_secs * 2).min(60);
                        continue;
                    }
                };

                let body: TgResponse<Vec<TgUpdate>> = match resp.json().await {
                    Ok(b) => b,
                    Err(e) => {
                        error!("telegram parse error (retry in {backoff_secs}s): {e}");
                        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                        backoff_secs = (backoff_secs * 2).min(60);
                        continue;
                    }
                };

                if !body.ok {
                    error!(
                        "telegram API error (retry in {backoff_secs}s): {}",
                        body.description.unwrap_or_default()
                    );
                    tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    backoff_secs = (backoff_secs * 2).min(60);
                    continue;
                }

                // Successful poll -- reset backoff.
                backoff_secs = 1;

                let updates = body.result.unwrap_or_default();

                if let Some(last_update) = updates.last() {
                    *last_update_id.lock().await = Some(last_update.update_id);
                }

                for update in updates {
                    let Some(msg) = update.message else {
                        continue;
                    };
                    let Some(event) = to_inbound(msg, bot_id) else {
                        debug!("telegram: skipping update {} without sender", update.update_id);
                        continue;
                    };

                    if tx.send(TransportEvent::Message(event)).await.is_err() {
                        info!("telegram channel receiver dropped, stopping poll");
                        return;
                    }
                }
            }
        });

        *self.poller.lock().await = Some(handle);
        Ok(rx)
    }

    async fn send_reply(&self, target: &ReplyTarget, text: &str) -> Result<(), ParleyError> {
        let (chat_id, reply_to) = Self::parse_target(&target.chat_id, &target.message_id)?;
        self.send_text(chat_id, reply_to, text).await
    }

    async fn stop(&self) -> Result<(), ParleyError> {
        if let Some(handle) = self.poller.lock().await.take() {
            handle.abort();
        }
        info!("Telegram channel stopped");
        Ok(())
    }
}
