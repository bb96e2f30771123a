//! Fail-closed wrapper around the generative backend.

use parley_core::{
    message::{ChatKind, MessageMetadata},
    prompt::{build_reply_prompt, PromptParts},
    traits::Provider,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Sent whenever the backend fails or returns nothing.
pub const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble thinking of a response right now. 🤔";

/// Reply text plus how it was produced.
#[derive(Debug, Clone)]
pub struct Generated {
    pub text: String,
    /// True when `text` is [`FALLBACK_REPLY`].
    pub fallback: bool,
    pub metadata: MessageMetadata,
}

pub struct Responder {
    provider: Arc<dyn Provider>,
    persona: String,
}

impl Responder {
    pub fn new(provider: Arc<dyn Provider>, persona: impl Into<String>) -> Self {
        Self {
            provider,
            persona: persona.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run `prompt` through the provider. Never fails: errors and blank
    /// output become [`FALLBACK_REPLY`].
    pub async fn generate(&self, prompt: &str) -> Generated {
        match self.provider.complete(prompt).await {
            Ok(completion) if !completion.text.trim().is_empty() => {
                debug!(
                    "{} replied in {}ms",
                    completion.metadata.provider_used, completion.metadata.processing_time_ms
                );
                Generated {
                    text: completion.text.trim().to_string(),
                    fallback: false,
                    metadata: completion.metadata,
                }
            }
            Ok(_) => {
                warn!("{} returned an empty reply, using fallback", self.provider.name());
                self.fallback()
            }
            Err(e) => {
                warn!("{} failed, using fallback: {e}", self.provider.name());
                self.fallback()
            }
        }
    }

    /// Render the reply prompt for one message and generate the answer.
    pub async fn reply(
        &self,
        body: &str,
        context: &str,
        chat_kind: ChatKind,
        group_name: Option<&str>,
    ) -> Generated {
        let prompt = build_reply_prompt(&PromptParts {
            persona: &self.persona,
            context,
            current_message: body,
            chat_kind,
            group_name,
        });
        self.generate(&prompt).await
    }

    fn fallback(&self) -> Generated {
        Generated {
            text: FALLBACK_REPLY.to_string(),
            fallback: true,
            metadata: MessageMetadata {
                provider_used: self.provider.name().to_string(),
                ..MessageMetadata::default()
            },
        }
    }
}
