//! Telegram Bot API channel.
//!
//! Uses long polling via `getUpdates` and `sendMessage` for replies.
//! Docs: <https://core.telegram.org/bots/api>

mod convert;
mod polling;
mod send;
mod types;


use parley_core::{config::TelegramConfig, error::ParleyError, message::AccountIdentity};
use std::sync::Arc;
use tokio::sync::Mutex;
use types::{TgResponse, TgUser};

/// Telegram channel using the Bot API with long polling.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
    base_url: String,
    /// Tracks the last update_id to avoid reprocessing.
    last_update_id: Arc<Mutex<Option<i64>>>,
    /// Handle of the polling task, aborted on `stop`.
    poller: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl TelegramChannel {
    /// Create a new Telegram channel from config.
    pub fn new(config: TelegramConfig) -> Self {
        let base_url = format!("https://api.telegram.org/bot{}", config.bot_token);
        Self {
            config,
            client: reqwest::Client::new(),
            base_url,
            last_update_id: Arc::new(Mutex::new(None)),
            poller: Mutex::new(None),
        }
    }

    /// Whether a bot token is configured.
    pub fn is_configured(&self) -> bool {
        !self.config.bot_token.is_empty()
    }

    /// Fetch the bot's own account via `getMe`.
    async fn get_me(&self) -> Result<AccountIdentity, ParleyError> {
        let url = format!("{}/getMe", self.base_url);
        let resp: TgResponse<TgUser> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ParleyError::Channel(format!("telegram getMe failed: {e}")))?
            .json()
            .await
            .map_err(|e| ParleyError::Channel(format!("telegram getMe parse failed: {e}")))?;

        if !resp.ok {
            return Err(ParleyError::Channel(format!(
                "telegram getMe rejected: {}",
                resp.description.unwrap_or_default()
            )));
        }
        let user = resp
            .result
            .ok_or_else(|| ParleyError::Channel("telegram getMe returned no user".into()))?;

        Ok(AccountIdentity {
            id: user.id.to_string(),
            display_name: user.full_name(),
            user: user.username.clone(),
        })
    }
}

/// Compose a chat-scoped Telegram message id into a globally unique one.
pub(crate) fn compose_message_id(chat_id: i64, message_id: i64) -> String {
    format!("{chat_id}:{message_id}")
}

/// Recover the Telegram `message_id` from a composed id.
pub(crate) fn telegram_message_id(composed: &str) -> Option<i64> {
    composed
        .rsplit_once(':')
        .and_then(|(_, id)| id.parse().ok())
}
