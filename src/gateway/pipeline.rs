//! Message pipeline: classify, persist, gate, reply.

use super::context::ContextBuilder;
use super::gate::ResponseGate;
use super::responder::{Generated, Responder};
use parley_core::{
    message::{AccountIdentity, InboundEvent, ReplyTarget, StoredMessage},
    traits::{Channel, MessageStore},
};
use parley_memory::audit::{ReplyEntry, ReplyLog, ReplyStatus};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

/// Why an event was dropped before storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Missing message or chat id.
    Malformed,
    EmptyBody,
    /// Protocol, revoke, or notification.
    NonContentType(String),
    /// Body carries an automated-reply signature.
    ReplySignature,
    /// Our own quoted reply coming back through ingestion.
    SelfQuotedReply,
}

/// Terminal state of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored(IgnoreReason),
    /// A store read or write failed; nothing was sent.
    Aborted,
    /// Stored, but the gate declined.
    Skipped,
    /// A reply was delivered.
    Responded { fallback: bool },
    /// The transport refused the reply; the message stays unanswered.
    SendFailed,
}

/// Per-channel event handler. Components are shared across channels.
pub struct Pipeline {
    channel: Arc<dyn Channel>,
    store: Arc<dyn MessageStore>,
    gate: ResponseGate,
    context: Arc<ContextBuilder>,
    responder: Arc<Responder>,
    reply_signatures: Vec<String>,
    identity: RwLock<Option<AccountIdentity>>,
    reply_log: Option<Arc<ReplyLog>>,
}

impl Pipeline {
    pub fn new(
        channel: Arc<dyn Channel>,
        store: Arc<dyn MessageStore>,
        gate: ResponseGate,
        context: Arc<ContextBuilder>,
        responder: Arc<Responder>,
        reply_signatures: Vec<String>,
    ) -> Self {
        Self {
            channel,
            store,
            gate,
            context,
            responder,
            reply_signatures: reply_signatures
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect(),
            identity: RwLock::new(None),
            reply_log: None,
        }
    }

    /// Record every reply attempt in the reply log.
    pub fn with_reply_log(mut self, log: Arc<ReplyLog>) -> Self {
        self.reply_log = Some(log);
        self
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    pub fn channel_name(&self) -> &str {
        self.channel.name()
    }

    /// Remember the account the transport is logged in as.
    pub fn set_identity(&self, identity: AccountIdentity) {
        match self.identity.write() {
            Ok(mut slot) => *slot = Some(identity),
            Err(poisoned) => *poisoned.into_inner() = Some(identity),
        }
    }

    fn identity(&self) -> Option<AccountIdentity> {
        match self.identity.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Process one inbound event to completion. Never panics or returns an
    /// error: every failure ends in an [`Outcome`].
    pub async fn handle(&self, event: InboundEvent) -> Outcome {
        if event.id.is_empty() || event.chat_id.is_empty() {
            warn!(
                "[{}] dropping malformed event (id '{}', chat '{}')",
                self.channel.name(),
                event.id,
                event.chat_id
            );
            return Outcome::Ignored(IgnoreReason::Malformed);
        }

        // --- 1. AUTHOR NAME ---
        let author_name = self.resolve_author(&event);

        // --- 2. CHAT RECORD ---
        let chat_name = self.chat_name(&event, &author_name).await;
        if let Err(e) = self
            .store
            .upsert_chat(&event.chat_id, &chat_name, event.is_group())
            .await
        {
            error!("[{}] {}: chat upsert failed: {e}", event.chat_id, event.id);
            return Outcome::Aborted;
        }

        // --- 3. CLASSIFY ---
        if let Some(reason) = self.classify(&event) {
            debug!("[{}] {}: ignored ({reason:?})", event.chat_id, event.id);
            return Outcome::Ignored(reason);
        }

        info!(
            "[{}] {}: {} says: {}",
            event.chat_id,
            event.id,
            author_name,
            preview(&event.body)
        );

        // --- 4. PERSIST ---
        let stored = StoredMessage {
            id: event.id.clone(),
            chat_id: event.chat_id.clone(),
            author_id: event.author_id.clone(),
            author_name: author_name.clone(),
            body: event.body.clone(),
            timestamp: event.timestamp.saturating_mul(1000),
            is_group: event.is_group(),
            group_name: event.group_name.clone(),
            message_type: event.message_type.clone(),
            is_ai_generated: false,
        };
        if let Err(e) = self.store.upsert_message(&stored).await {
            error!("[{}] {}: message store failed: {e}", event.chat_id, event.id);
            return Outcome::Aborted;
        }

        // --- 5. GATE ---
        let Some(claim) = self.gate.claim(&event.id, &event.body, &author_name).await else {
            return Outcome::Skipped;
        };

        let context = match self
            .context
            .build(&event.chat_id, event.is_group(), event.group_name.as_deref())
            .await
        {
            Ok(c) => c,
            Err(e) => {
                error!("[{}] {}: context build failed: {e}", event.chat_id, event.id);
                return Outcome::Aborted;
            }
        };

        let generated = self
            .responder
            .reply(
                &event.body,
                &context,
                event.chat_kind,
                event.group_name.as_deref(),
            )
            .await;

        let target = ReplyTarget {
            chat_id: event.chat_id.clone(),
            message_id: event.id.clone(),
        };

        match self.channel.send_reply(&target, &generated.text).await {
            Ok(()) => {
                if let Err(e) = claim.commit().await {
                    warn!(
                        "[{}] {}: failed to mark answered, holding it until restart: {e}",
                        event.chat_id, event.id
                    );
                }
                info!(
                    "[{}] {}: replied{}",
                    event.chat_id,
                    event.id,
                    if generated.fallback { " (fallback)" } else { "" }
                );
                let status = if generated.fallback {
                    ReplyStatus::Fallback
                } else {
                    ReplyStatus::Sent
                };
                self.log_reply(&event, &author_name, &generated, status, None)
                    .await;
                Outcome::Responded {
                    fallback: generated.fallback,
                }
            }
            Err(e) => {
                // The claim drops here unmarked; nothing retries within this event.
                error!("[{}] {}: reply send failed: {e}", event.chat_id, event.id);
                self.log_reply(
                    &event,
                    &author_name,
                    &generated,
                    ReplyStatus::SendFailed,
                    Some(e.to_string()),
                )
                .await;
                Outcome::SendFailed
            }
        }
    }

    /// Nickname, display name, phone, handle, then the raw author id.
    /// Self-sent messages prefer the account's own display name.
    fn resolve_author(&self, event: &InboundEvent) -> String {
        let resolved = event.author.preferred().map(str::to_string);
        let me = if event.self_sent { self.identity() } else { None };

        let name = match me {
            Some(me) => me
                .display_name
                .filter(|n| !n.trim().is_empty())
                .or(resolved)
                .or(me.user.filter(|u| !u.trim().is_empty())),
            None => resolved,
        };
        name.unwrap_or_else(|| event.author_id.clone())
    }

    /// Groups are named after the group; direct chats after the other party.
    async fn chat_name(&self, event: &InboundEvent, author_name: &str) -> String {
        if event.is_group() {
            return event
                .group_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| event.chat_id.clone());
        }
        if !event.self_sent {
            return author_name.to_string();
        }
        // Our own message in a direct chat: keep whatever name we already have.
        match self.store.get_chat(&event.chat_id).await {
            Ok(Some(chat)) if !chat.name.is_empty() => chat.name,
            _ => event.chat_id.clone(),
        }
    }

    fn classify(&self, event: &InboundEvent) -> Option<IgnoreReason> {
        if event.body.trim().is_empty() {
            return Some(IgnoreReason::EmptyBody);
        }
        if event.message_type.is_non_content() {
            return Some(IgnoreReason::NonContentType(
                event.message_type.as_tag().to_string(),
            ));
        }
        if self
            .reply_signatures
            .iter()
            .any(|sig| event.body.contains(sig.as_str()))
        {
            return Some(IgnoreReason::ReplySignature);
        }
        if event.self_sent && event.has_quoted {
            return Some(IgnoreReason::SelfQuotedReply);
        }
        None
    }

    async fn log_reply(
        &self,
        event: &InboundEvent,
        author_name: &str,
        generated: &Generated,
        status: ReplyStatus,
        detail: Option<String>,
    ) {
        let Some(log) = &self.reply_log else {
            return;
        };
        let entry = ReplyEntry {
            message_id: event.id.clone(),
            chat_id: event.chat_id.clone(),
            author_name: Some(author_name.to_string()),
            input_text: event.body.clone(),
            output_text: Some(generated.text.clone()),
            provider_used: Some(self.responder.provider_name().to_string()),
            model: generated.metadata.model.clone(),
            processing_ms: Some(generated.metadata.processing_time_ms as i64),
            status,
            detail,
        };
        if let Err(e) = log.log(&entry).await {
            warn!("[{}] {}: reply log write failed: {e}", event.chat_id, event.id);
        }
    }
}

fn preview(body: &str) -> String {
    if body.chars().count() > 60 {
        let truncated: String = body.chars().take(60).collect();
        format!("{truncated}...")
    } else {
        body.to_string()
    }
}
