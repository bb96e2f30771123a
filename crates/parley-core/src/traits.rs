use crate::{
    error::ParleyError,
    message::{ChatRecord, Completion, ReplyTarget, StoredMessage, TransportEvent},
};
use async_trait::async_trait;

/// Generative-text backend: one prompt in, one reply out.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Whether this provider requires an API key to function.
    fn requires_api_key(&self) -> bool;

    /// Run a single prompt and return the generated text.
    async fn complete(&self, prompt: &str) -> Result<Completion, ParleyError>;

    /// Check if the provider is available and ready.
    async fn is_available(&self) -> bool;
}

/// Chat transport: delivers inbound events and sends replies.
///
/// Connection, pairing, and reconnect handling stay inside the implementation.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start listening. The receiver yields lifecycle notices and messages.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<TransportEvent>, ParleyError>;

    /// Send `text` to the target chat as a reply to the target message.
    async fn send_reply(&self, target: &ReplyTarget, text: &str) -> Result<(), ParleyError>;

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), ParleyError>;
}

/// Durable record of chats and messages.
///
/// Implementations must be safe for concurrent use; no cross-row
/// transactions are required.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert or refresh a chat, bumping its last-activity timestamp.
    async fn upsert_chat(&self, id: &str, name: &str, is_group: bool) -> Result<(), ParleyError>;

    /// Insert a message, overwriting any existing row with the same id.
    async fn upsert_message(&self, message: &StoredMessage) -> Result<(), ParleyError>;

    /// Up to `limit` messages of a chat, most recent first.
    async fn recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, ParleyError>;

    /// Look up a chat by id.
    async fn get_chat(&self, id: &str) -> Result<Option<ChatRecord>, ParleyError>;
}

/// Backing store for the set of message ids that already received a reply.
#[async_trait]
pub trait AnsweredStore: Send + Sync {
    async fn contains(&self, message_id: &str) -> Result<bool, ParleyError>;

    /// Insert `message_id`; returns `false` if it was already present.
    async fn insert(&self, message_id: &str) -> Result<bool, ParleyError>;
}
