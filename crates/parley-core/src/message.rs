use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a conversation is one-to-one or a named group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Direct,
    Group,
}

impl ChatKind {
    pub fn is_group(self) -> bool {
        matches!(self, Self::Group)
    }
}

/// Transport message-type tag.
///
/// Only `Text` and unknown tags carry human content; the named non-content
/// types are dropped at classification time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    Text,
    Protocol,
    Revoke,
    Notification,
    Other(String),
}

impl MessageKind {
    /// Parse a transport tag. `e2e_notification` folds into `Notification`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "" | "text" | "chat" => Self::Text,
            "protocol" => Self::Protocol,
            "revoke" => Self::Revoke,
            "notification" | "e2e_notification" => Self::Notification,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Protocol => "protocol",
            Self::Revoke => "revoke",
            Self::Notification => "notification",
            Self::Other(tag) => tag,
        }
    }

    /// True for the system types that never carry a user-authored body.
    pub fn is_non_content(&self) -> bool {
        matches!(self, Self::Protocol | Self::Revoke | Self::Notification)
    }
}

impl From<String> for MessageKind {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        kind.as_tag().to_string()
    }
}

/// The name fields a transport can report for a message author.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorNames {
    /// Nickname the contact chose for themselves.
    pub nickname: Option<String>,
    /// Name saved in the account's address book or platform display name.
    pub display_name: Option<String>,
    /// Phone number, when the transport exposes one.
    pub phone: Option<String>,
    /// Platform handle (user part of the id, @username, ...).
    pub handle: Option<String>,
}

impl AuthorNames {
    /// First non-blank name in preference order: nickname, display name,
    /// phone, handle.
    pub fn preferred(&self) -> Option<&str> {
        [
            &self.nickname,
            &self.display_name,
            &self.phone,
            &self.handle,
        ]
        .into_iter()
        .filter_map(|n| n.as_deref())
        .find(|n| !n.trim().is_empty())
    }
}

/// An inbound message notification from a transport.
///
/// Adapters resolve contact and chat lookups before emitting the event, so
/// the pipeline never calls back into the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Transport-assigned, globally unique message id.
    pub id: String,
    pub chat_id: String,
    pub chat_kind: ChatKind,
    /// Group name, for group chats.
    pub group_name: Option<String>,
    pub author_id: String,
    pub author: AuthorNames,
    pub body: String,
    pub message_type: MessageKind,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    /// Sent from the account the bot runs as.
    pub self_sent: bool,
    /// The message quotes (replies to) another message.
    pub has_quoted: bool,
}

impl InboundEvent {
    pub fn is_group(&self) -> bool {
        self.chat_kind.is_group()
    }
}

/// Identity of the account the transport is logged in as.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountIdentity {
    pub id: String,
    /// Public display name of the account.
    pub display_name: Option<String>,
    /// User part of the account id (phone number or handle).
    pub user: Option<String>,
}

/// Notifications a transport delivers to the gateway.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Client connected and authenticated.
    Ready(AccountIdentity),
    /// The transport needs the operator to pair the device (QR payload).
    PairingCode(String),
    Message(InboundEvent),
}

/// Where a reply goes: the chat, quoting the triggering message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub chat_id: String,
    pub message_id: String,
}

/// A conversation container as persisted by the message store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    pub name: String,
    pub is_group: bool,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// A persisted chat message. `id` is the dedup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub chat_id: String,
    pub author_id: String,
    pub author_name: String,
    pub body: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub is_group: bool,
    pub group_name: Option<String>,
    pub message_type: MessageKind,
    pub is_ai_generated: bool,
}

/// Metadata about how a reply was generated.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessageMetadata {
    /// Which provider produced this response.
    pub provider_used: String,
    /// Token count (if available from the provider).
    pub tokens_used: Option<u64>,
    /// Wall-clock processing time in milliseconds.
    pub processing_time_ms: u64,
    /// Model identifier (if applicable).
    pub model: Option<String>,
}

/// Text returned by a provider.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub metadata: MessageMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind_tags() {
        assert_eq!(MessageKind::from_tag("text"), MessageKind::Text);
        assert_eq!(MessageKind::from_tag(""), MessageKind::Text);
        assert_eq!(
            MessageKind::from_tag("e2e_notification"),
            MessageKind::Notification
        );
        assert_eq!(
            MessageKind::from_tag("sticker"),
            MessageKind::Other("sticker".into())
        );
        assert_eq!(MessageKind::Revoke.as_tag(), "revoke");
        assert!(MessageKind::Protocol.is_non_content());
        assert!(!MessageKind::Other("image".into()).is_non_content());
    }

    #[test]
    fn test_message_kind_serde_as_string() {
        let json = serde_json::to_string(&MessageKind::Revoke).unwrap();
        assert_eq!(json, "\"revoke\"");
        let kind: MessageKind = serde_json::from_str("\"location\"").unwrap();
        assert_eq!(kind, MessageKind::Other("location".into()));
    }

    #[test]
    fn test_author_preferred_order() {
        let names = AuthorNames {
            nickname: None,
            display_name: Some("Alice Smith".into()),
            phone: Some("5511999887766".into()),
            handle: Some("5511999887766".into()),
        };
        assert_eq!(names.preferred(), Some("Alice Smith"));

        let names = AuthorNames {
            nickname: Some("  ".into()),
            display_name: None,
            phone: None,
            handle: Some("alice".into()),
        };
        assert_eq!(names.preferred(), Some("alice"));
        assert_eq!(AuthorNames::default().preferred(), None);
    }
}
