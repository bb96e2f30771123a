//! Context builder: recent chat history rendered for the reply prompt.

use chrono::DateTime;
use parley_core::{error::ParleyError, message::StoredMessage, traits::MessageStore};
use std::sync::Arc;

/// Returned when a chat has no stored history.
pub const NEW_CONVERSATION: &str = "This is a new conversation.";

/// Default number of messages included in a context block.
pub const DEFAULT_CONTEXT_LIMIT: usize = 20;

/// Turns the most recent messages of a chat into a bounded text block.
pub struct ContextBuilder {
    store: Arc<dyn MessageStore>,
    limit: usize,
}

impl ContextBuilder {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            limit: DEFAULT_CONTEXT_LIMIT,
        }
    }

    /// Override the history bound. Zero is raised to one.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Render up to `limit` recent messages of `chat_id`, oldest first.
    pub async fn build(
        &self,
        chat_id: &str,
        is_group: bool,
        group_name: Option<&str>,
    ) -> Result<String, ParleyError> {
        let mut history = self.store.recent_messages(chat_id, self.limit).await?;
        history.truncate(self.limit);
        history.reverse();
        Ok(render(&history, is_group, group_name))
    }
}

fn render(history: &[StoredMessage], is_group: bool, group_name: Option<&str>) -> String {
    if history.is_empty() {
        return NEW_CONVERSATION.to_string();
    }

    let mut lines = Vec::with_capacity(history.len() + 2);
    if let (true, Some(name)) = (is_group, group_name.filter(|n| !n.is_empty())) {
        lines.push(format!("This is a group chat called \"{name}\"."));
    }
    lines.push("Recent conversation context:".to_string());

    for msg in history {
        let prefix = if msg.is_group {
            match msg.group_name.as_deref().or(group_name) {
                Some(name) => format!("[{name}] "),
                None => String::new(),
            }
        } else {
            String::new()
        };
        lines.push(format!(
            "{} {prefix}{}: {}",
            format_time(msg.timestamp),
            msg.author_name,
            single_line(&msg.body)
        ));
    }

    lines.join("\n")
}

/// `HH:MM:SS` in UTC for an epoch-millisecond timestamp.
fn format_time(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

/// One history entry per line.
fn single_line(body: &str) -> String {
    body.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::MessageKind;

    fn msg(i: i64, body: &str) -> StoredMessage {
        StoredMessage {
            id: format!("m{i}"),
            chat_id: "c1".into(),
            author_id: "a".into(),
            author_name: "Alice".into(),
            body: body.into(),
            timestamp: i * 1_000,
            is_group: false,
            group_name: None,
            message_type: MessageKind::Text,
            is_ai_generated: false,
        }
    }

    #[test]
    fn test_empty_history_is_new_conversation() {
        assert_eq!(render(&[], true, Some("Team")), NEW_CONVERSATION);
    }

    #[test]
    fn test_direct_lines_have_no_bracket() {
        let text = render(&[msg(0, "hi"), msg(61, "still there?")], false, None);
        assert_eq!(
            text,
            "Recent conversation context:\n\
             00:00:00 Alice: hi\n\
             00:01:01 Alice: still there?"
        );
    }

    #[test]
    fn test_group_header_and_bracket() {
        let mut m = msg(3_600, "hi all");
        m.is_group = true;
        m.group_name = Some("Team".into());
        let text = render(&[m], true, Some("Team"));
        assert_eq!(
            text,
            "This is a group chat called \"Team\".\n\
             Recent conversation context:\n\
             01:00:00 [Team] Alice: hi all"
        );
    }

    #[test]
    fn test_group_without_name_has_no_header() {
        let mut m = msg(0, "hi");
        m.is_group = true;
        let text = render(&[m], true, None);
        assert!(text.starts_with("Recent conversation context:"));
        assert!(text.ends_with("00:00:00 Alice: hi"));
    }

    #[test]
    fn test_multiline_body_flattened() {
        let text = render(&[msg(0, "line one\nline two")], false, None);
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with("Alice: line one line two"));
    }
}
