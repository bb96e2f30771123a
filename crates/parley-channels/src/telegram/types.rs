//! Telegram Bot API deserialization types.

use serde::{de::IgnoredAny, Deserialize};

#[derive(Debug, Deserialize)]
pub(crate) struct TgResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgUpdate {
    pub update_id: i64,
    pub message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgMessage {
    pub message_id: i64,
    pub from: Option<TgUser>,
    pub chat: TgChat,
    /// Unix time in seconds.
    #[serde(default)]
    pub date: i64,
    pub text: Option<String>,
    pub caption: Option<String>,
    /// Only its presence matters.
    pub reply_to_message: Option<IgnoredAny>,
    pub new_chat_members: Option<Vec<TgUser>>,
    pub left_chat_member: Option<TgUser>,
    pub new_chat_title: Option<String>,
    pub pinned_message: Option<IgnoredAny>,
    pub group_chat_created: Option<bool>,
}

impl TgMessage {
    /// Whether this is a service message (membership, title, pin changes).
    pub fn is_service(&self) -> bool {
        self.new_chat_members.is_some()
            || self.left_chat_member.is_some()
            || self.new_chat_title.is_some()
            || self.pinned_message.is_some()
            || self.group_chat_created.unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl TgUser {
    /// First and last name joined, as the user set them.
    pub fn full_name(&self) -> Option<String> {
        let name = match self.last_name {
            Some(ref ln) if !ln.is_empty() => format!("{} {ln}", self.first_name),
            _ => self.first_name.clone(),
        };
        let name = name.trim().to_string();
        (!name.is_empty()).then_some(name)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgChat {
    pub id: i64,
    /// Chat type: "private", "group", "supergroup", or "channel".
    #[serde(default, rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
}

impl TgChat {
    pub fn is_group(&self) -> bool {
        matches!(self.chat_type.as_str(), "group" | "supergroup")
    }
}
