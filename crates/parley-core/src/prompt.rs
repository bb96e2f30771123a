//! Reply prompt template.

use crate::message::ChatKind;

/// Default persona line opening every prompt.
pub const DEFAULT_PERSONA: &str = "You are a helpful AI assistant in a chat conversation.";

/// Everything the template needs for one reply.
pub struct PromptParts<'a> {
    pub persona: &'a str,
    /// Rendered context block (never empty).
    pub context: &'a str,
    pub current_message: &'a str,
    pub chat_kind: ChatKind,
    pub group_name: Option<&'a str>,
}

/// Render the prompt sent to the generative backend.
pub fn build_reply_prompt(parts: &PromptParts<'_>) -> String {
    let mut guidance = String::from(
        "Please provide a helpful, natural response. \
         Keep it conversational and appropriate for the context.",
    );
    if parts.chat_kind.is_group() {
        match parts.group_name {
            Some(name) if !name.is_empty() => guidance.push_str(&format!(
                " This is the group chat \"{name}\", so you can reference other participants naturally."
            )),
            _ => guidance
                .push_str(" This is a group chat, so you can reference other participants naturally."),
        }
    }

    format!(
        "{}\n\n{}\n\nCurrent message: \"{}\"\n\n{guidance}\n\nResponse:",
        parts.persona, parts.context, parts.current_message
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_prompt_layout() {
        let prompt = build_reply_prompt(&PromptParts {
            persona: DEFAULT_PERSONA,
            context: "This is a new conversation.",
            current_message: "hello",
            chat_kind: ChatKind::Direct,
            group_name: None,
        });
        assert!(prompt.starts_with(DEFAULT_PERSONA));
        assert!(prompt.contains("\n\nThis is a new conversation.\n\n"));
        assert!(prompt.contains("Current message: \"hello\""));
        assert!(!prompt.contains("group chat"));
        assert!(prompt.ends_with("Response:"));
    }

    #[test]
    fn test_group_prompt_mentions_group() {
        let prompt = build_reply_prompt(&PromptParts {
            persona: "Be brief.",
            context: "ctx",
            current_message: "hi all",
            chat_kind: ChatKind::Group,
            group_name: Some("Climbing"),
        });
        assert!(prompt.contains("group chat \"Climbing\""));

        let unnamed = build_reply_prompt(&PromptParts {
            persona: "Be brief.",
            context: "ctx",
            current_message: "hi all",
            chat_kind: ChatKind::Group,
            group_name: None,
        });
        assert!(unnamed.contains("This is a group chat,"));
    }
}
