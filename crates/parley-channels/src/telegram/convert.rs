//! Mapping Telegram updates onto transport-neutral inbound events.

use super::compose_message_id;
use super::types::TgMessage;
use parley_core::message::{AuthorNames, ChatKind, InboundEvent, MessageKind};

/// Convert a Telegram message. Returns `None` for messages without a sender
/// (channel posts), which carry no author to attribute.
pub(crate) fn to_inbound(msg: TgMessage, bot_id: Option<i64>) -> Option<InboundEvent> {
    let user = msg.from.as_ref()?;

    let message_type = if msg.text.is_some() {
        MessageKind::Text
    } else if msg.is_service() {
        MessageKind::Notification
    } else {
        MessageKind::Other("media".to_string())
    };

    let body = msg
        .text
        .clone()
        .or_else(|| msg.caption.clone())
        .unwrap_or_default();

    let chat_kind = if msg.chat.is_group() {
        ChatKind::Group
    } else {
        ChatKind::Direct
    };

    let author = AuthorNames {
        nickname: user.full_name(),
        display_name: None,
        phone: None,
        handle: user.username.as_ref().map(|u| format!("@{u}")),
    };

    Some(InboundEvent {
        id: compose_message_id(msg.chat.id, msg.message_id),
        chat_id: msg.chat.id.to_string(),
        chat_kind,
        group_name: if chat_kind.is_group() {
            msg.chat.title.clone()
        } else {
            None
        },
        author_id: user.id.to_string(),
        author,
        body,
        message_type,
        timestamp: msg.date,
        self_sent: bot_id == Some(user.id),
        has_quoted: msg.reply_to_message.is_some(),
    })
}
