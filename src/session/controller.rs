//! The conversation session controller: one state object tying auth,
//! conversation selection, message exchange and playback together. All
//! mutations of the message buffer and conversation list go through the
//! transition methods here.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::internal::{Conversation, Reaction, Role};
use crate::models::persona::{self, AssistantType};
use crate::session::active_store::{KeyValueStore, ACTIVE_CONVERSATION_KEY};
use crate::session::gateway::{ChatGateway, GatewayError};
use crate::session::typewriter::Typewriter;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Input is empty")]
    EmptyInput,
    #[error("A reply is already in flight")]
    Busy,
    #[error("No active conversation")]
    NoActiveConversation,
    #[error("Feedback requires a signed-in user")]
    GuestFeedback,
    #[error("Message has no persisted id")]
    UnpersistedMessage,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Bootstrapping,
    Guest,
    Authenticated(AuthUser),
}

/// Identity of the conversation a message buffer belongs to. Guest
/// conversations get a synthetic local key and are never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationKey {
    Persisted(Uuid),
    Local(String),
}

impl ConversationKey {
    pub fn persisted_id(&self) -> Option<Uuid> {
        match self {
            ConversationKey::Persisted(id) => Some(*id),
            ConversationKey::Local(_) => None,
        }
    }

    fn storage_token(&self) -> String {
        match self {
            ConversationKey::Persisted(id) => id.to_string(),
            ConversationKey::Local(s) => s.clone(),
        }
    }
}

/// One entry of the displayed message buffer. `local_id` is the correlation
/// token tying optimistic entries to their later server-confirmed ids.
#[derive(Debug, Clone)]
pub struct BufferedMessage {
    pub local_id: u64,
    pub id: Option<Uuid>,
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplyCycle {
    Idle,
    AwaitingReply {
        conversation: ConversationKey,
        placeholder: u64,
    },
    Revealing {
        conversation: ConversationKey,
        placeholder: u64,
        full_text: String,
    },
}

struct ActiveConversation {
    key: ConversationKey,
    assistant: AssistantType,
    title: String,
}

/// In-flight send state. Correlates the eventual reply with the conversation
/// it was issued for, so a late result cannot land in a different one.
pub struct PendingSend {
    conversation: ConversationKey,
    assistant: AssistantType,
    placeholder: u64,
    user_local: u64,
    user_text: String,
    title_job: Option<TitleJob>,
}

struct TitleJob {
    conversation: Uuid,
    /// Placeholder title at send time; the rename only applies while the
    /// conversation still carries it.
    placeholder_title: String,
}

/// Everything the network phase of a send produced.
pub struct SendOutcome {
    pub reply: Result<String, GatewayError>,
    pub user_message_id: Option<Uuid>,
    pub smart_title: Option<String>,
}

pub struct ChatSession {
    gateway: Arc<dyn ChatGateway>,
    store: Box<dyn KeyValueStore>,
    auth: AuthState,
    conversations: Vec<Conversation>,
    active: Option<ActiveConversation>,
    messages: Vec<BufferedMessage>,
    reactions: HashMap<Uuid, Reaction>,
    reply: ReplyCycle,
    typewriter: Typewriter,
    next_local_id: u64,
}

impl ChatSession {
    pub fn new(gateway: Arc<dyn ChatGateway>, store: Box<dyn KeyValueStore>) -> Self {
        Self {
            gateway,
            store,
            auth: AuthState::Bootstrapping,
            conversations: Vec::new(),
            active: None,
            messages: Vec::new(),
            reactions: HashMap::new(),
            reply: ReplyCycle::Idle,
            typewriter: Typewriter::new(),
            next_local_id: 1,
        }
    }

    // ==================== AUTH TRANSITIONS ====================

    /// Page-load bootstrap with whatever session the auth provider reported.
    /// Always lands on the assistant picker, even when a previous
    /// conversation id is still cached.
    pub async fn bootstrap(&mut self, session_user: Option<AuthUser>) {
        match session_user {
            Some(user) => {
                self.auth = AuthState::Authenticated(user);
                self.reload_conversations().await;
            }
            None => {
                self.auth = AuthState::Guest;
                self.conversations.clear();
            }
        }
        self.reset_selection();
    }

    pub async fn handle_sign_in(&mut self, user: AuthUser) {
        self.messages.clear(); // guest-mode buffer does not carry over
        self.auth = AuthState::Authenticated(user);
        self.reload_conversations().await;
        self.reset_selection();
    }

    pub fn handle_sign_out(&mut self) {
        self.auth = AuthState::Guest;
        self.conversations.clear();
        self.store.clear(ACTIVE_CONVERSATION_KEY);
        self.reset_selection();
    }

    // ==================== CONVERSATION SELECTION ====================

    /// Choose a persona from the picker; optionally dispatches a suggested
    /// first question right away.
    pub async fn start_assistant(
        &mut self,
        assistant: AssistantType,
        initial_question: Option<&str>,
    ) -> Result<(), SessionError> {
        let key = self.open_conversation(assistant.default_title(), assistant).await?;

        self.reset_selection();
        self.store.set(ACTIVE_CONVERSATION_KEY, &key.storage_token());
        self.active = Some(ActiveConversation {
            key: key.clone(),
            assistant,
            title: assistant.default_title().to_string(),
        });

        // Fixed greeting, persisted only for signed-in users.
        let greeting_local = self.push_message(Role::Assistant, assistant.greeting());
        if let Some(id) = key.persisted_id() {
            match self
                .gateway
                .append_message(id, Role::Assistant, assistant.greeting().to_string())
                .await
            {
                Ok(message_id) => self.confirm_message(greeting_local, message_id),
                Err(e) => tracing::warn!("Failed to persist greeting: {}", e),
            }
        }

        if let Some(question) = initial_question {
            self.send(question).await?;
        }
        Ok(())
    }

    /// Switch to an existing conversation, dropping any in-flight reply
    /// state so a late result cannot land here.
    pub async fn select_conversation(&mut self, id: Uuid) -> Result<(), SessionError> {
        self.reset_selection();

        let (assistant, title) = self
            .conversations
            .iter()
            .find(|c| c.id == id)
            .map(|c| (c.assistant_type, c.title.clone()))
            .unwrap_or((
                AssistantType::default(),
                persona::DEFAULT_CONVERSATION_TITLE.to_string(),
            ));
        self.active = Some(ActiveConversation {
            key: ConversationKey::Persisted(id),
            assistant,
            title,
        });
        self.store.set(ACTIVE_CONVERSATION_KEY, &id.to_string());

        let history = match self.gateway.list_messages(id).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!("Failed to load messages for {}: {}", id, e);
                Vec::new()
            }
        };
        for message in history {
            let local_id = self.alloc_local_id();
            self.messages.push(BufferedMessage {
                local_id,
                id: Some(message.id),
                role: message.role,
                text: message.text,
            });
        }
        Ok(())
    }

    /// Explicit "new conversation": back to the picker, cached id dropped.
    pub fn new_conversation(&mut self) {
        self.store.clear(ACTIVE_CONVERSATION_KEY);
        self.reset_selection();
    }

    pub async fn rename_conversation(
        &mut self,
        id: Uuid,
        title: &str,
    ) -> Result<(), SessionError> {
        let updated = self.gateway.rename_conversation(id, title.to_string()).await?;
        self.apply_title(id, updated.title);
        Ok(())
    }

    pub async fn delete_conversation(&mut self, id: Uuid) -> Result<(), SessionError> {
        self.gateway.delete_conversation(id).await?;
        self.conversations.retain(|c| c.id != id);
        let was_active = self
            .active
            .as_ref()
            .is_some_and(|a| a.key == ConversationKey::Persisted(id));
        if was_active {
            self.store.clear(ACTIVE_CONVERSATION_KEY);
            self.reset_selection();
        }
        Ok(())
    }

    // ==================== SEND PIPELINE ====================

    /// Full send pipeline: transition, network phase, completion.
    pub async fn send(&mut self, text: &str) -> Result<(), SessionError> {
        let trimmed = text.trim().to_string();
        if trimmed.is_empty() {
            return Err(SessionError::EmptyInput);
        }
        if self.reply != ReplyCycle::Idle {
            return Err(SessionError::Busy);
        }

        self.ensure_active().await?;
        let pending = self.begin_send(&trimmed)?;
        let outcome = self.dispatch(&pending).await;
        self.finish_send(pending, outcome).await;
        Ok(())
    }

    /// Synchronous start of a send: optimistic user entry, thinking
    /// placeholder, reply-cycle bookkeeping. Requires an active conversation.
    pub fn begin_send(&mut self, text: &str) -> Result<PendingSend, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyInput);
        }
        if self.reply != ReplyCycle::Idle {
            return Err(SessionError::Busy);
        }
        let (conversation, assistant, title) = match &self.active {
            Some(active) => (active.key.clone(), active.assistant, active.title.clone()),
            None => return Err(SessionError::NoActiveConversation),
        };

        let user_local = self.push_message(Role::User, text);
        let first_user_message = self
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .count()
            == 1;

        let title_job = match (&conversation, first_user_message) {
            (ConversationKey::Persisted(id), true) if persona::is_placeholder_title(&title) => {
                Some(TitleJob {
                    conversation: *id,
                    placeholder_title: title,
                })
            }
            _ => None,
        };

        let placeholder = self.push_message(Role::Assistant, "");
        self.reply = ReplyCycle::AwaitingReply {
            conversation: conversation.clone(),
            placeholder,
        };

        Ok(PendingSend {
            conversation,
            assistant,
            placeholder,
            user_local,
            user_text: text.to_string(),
            title_job,
        })
    }

    /// Network phase: user-message persistence, the LLM call and the
    /// smart-title call run concurrently; none blocks another.
    pub async fn dispatch(&self, pending: &PendingSend) -> SendOutcome {
        let persist_user = async {
            match pending.conversation.persisted_id() {
                Some(id) if self.is_authenticated() => {
                    match self
                        .gateway
                        .append_message(id, Role::User, pending.user_text.clone())
                        .await
                    {
                        Ok(message_id) => Some(message_id),
                        Err(e) => {
                            tracing::warn!("Failed to persist user message: {}", e);
                            None
                        }
                    }
                }
                _ => None,
            }
        };

        let reply = self
            .gateway
            .generate_reply(pending.user_text.clone(), pending.assistant.system_prompt());

        let title = async {
            match &pending.title_job {
                Some(_) => match self
                    .gateway
                    .smart_title(pending.user_text.clone(), pending.assistant)
                    .await
                {
                    Ok(title) => Some(title),
                    Err(e) => {
                        tracing::warn!("Smart title request failed: {}", e);
                        None
                    }
                },
                None => None,
            }
        };

        let (user_message_id, reply, smart_title) = tokio::join!(persist_user, reply, title);
        SendOutcome {
            reply,
            user_message_id,
            smart_title,
        }
    }

    /// Completion of a send. The smart title belongs to its conversation and
    /// is applied regardless of what is on screen; the reply itself is
    /// discarded when the user has since switched conversations.
    pub async fn finish_send(&mut self, pending: PendingSend, outcome: SendOutcome) {
        if let (Some(job), Some(new_title)) = (&pending.title_job, &outcome.smart_title) {
            let still_placeholder = self
                .conversations
                .iter()
                .find(|c| c.id == job.conversation)
                .map(|c| c.title == job.placeholder_title)
                .unwrap_or(false);
            if still_placeholder {
                match self
                    .gateway
                    .rename_conversation(job.conversation, new_title.clone())
                    .await
                {
                    Ok(updated) => self.apply_title(job.conversation, updated.title),
                    Err(e) => tracing::warn!("Failed to persist smart title: {}", e),
                }
            }
        }

        if !self.reply_belongs(&pending) {
            tracing::debug!("Discarding reply for a no-longer-active conversation");
            return;
        }

        if let Some(message_id) = outcome.user_message_id {
            self.confirm_message(pending.user_local, message_id);
        }

        match outcome.reply {
            Err(e) => {
                tracing::warn!("AI reply failed: {}", e);
                self.set_message_text(pending.placeholder, persona::APOLOGY_REPLY);
                self.reply = ReplyCycle::Idle;
            }
            Ok(full_text) => {
                // Persist the full answer before playback begins.
                if let Some(id) = pending.conversation.persisted_id() {
                    if self.is_authenticated() {
                        match self
                            .gateway
                            .append_message(id, Role::Assistant, full_text.clone())
                            .await
                        {
                            Ok(message_id) => {
                                self.confirm_message(pending.placeholder, message_id)
                            }
                            Err(e) => {
                                tracing::warn!("Failed to persist assistant reply: {}", e)
                            }
                        }
                    }
                }

                self.typewriter.start(&full_text);
                self.reply = ReplyCycle::Revealing {
                    conversation: pending.conversation.clone(),
                    placeholder: pending.placeholder,
                    full_text,
                };
                if self.typewriter.is_finished() {
                    self.finalize_playback();
                }
            }
        }
    }

    // ==================== PLAYBACK ====================

    /// Advance the reveal clock one tick; call at the typewriter cadence.
    pub fn playback_tick(&mut self) {
        if self.typewriter.tick() {
            self.finalize_playback();
        }
    }

    pub fn pause_playback(&mut self) {
        self.typewriter.pause();
    }

    pub fn resume_playback(&mut self) {
        self.typewriter.resume();
    }

    /// Manual stop: the visible text snaps to the full answer.
    pub fn stop_playback(&mut self) {
        if matches!(self.reply, ReplyCycle::Revealing { .. }) {
            self.typewriter.stop();
            self.finalize_playback();
        }
    }

    fn finalize_playback(&mut self) {
        if let ReplyCycle::Revealing {
            placeholder,
            full_text,
            ..
        } = std::mem::replace(&mut self.reply, ReplyCycle::Idle)
        {
            self.set_message_text(placeholder, &full_text);
        }
    }

    // ==================== FEEDBACK ====================

    /// Like/dislike an assistant message. Optimistic: the local reaction is
    /// recorded first and reverted when the request fails.
    pub async fn feedback(
        &mut self,
        local_id: u64,
        reaction: Reaction,
    ) -> Result<(), SessionError> {
        if !self.is_authenticated() {
            return Err(SessionError::GuestFeedback);
        }
        let message_id = self
            .messages
            .iter()
            .find(|m| m.local_id == local_id)
            .and_then(|m| m.id)
            .ok_or(SessionError::UnpersistedMessage)?;

        let previous = self.reactions.insert(message_id, reaction);
        if let Err(e) = self.gateway.submit_feedback(message_id, reaction).await {
            match previous {
                Some(p) => {
                    self.reactions.insert(message_id, p);
                }
                None => {
                    self.reactions.remove(&message_id);
                }
            }
            return Err(e.into());
        }
        Ok(())
    }

    pub fn reaction_for(&self, message_id: Uuid) -> Option<Reaction> {
        self.reactions.get(&message_id).copied()
    }

    // ==================== ACCESSORS ====================

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.auth, AuthState::Authenticated(_))
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn messages(&self) -> &[BufferedMessage] {
        &self.messages
    }

    pub fn active_conversation(&self) -> Option<&ConversationKey> {
        self.active.as_ref().map(|a| &a.key)
    }

    pub fn active_title(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.title.as_str())
    }

    /// Busy flag gating the input control.
    pub fn is_replying(&self) -> bool {
        self.reply != ReplyCycle::Idle
    }

    pub fn is_revealing(&self) -> bool {
        matches!(self.reply, ReplyCycle::Revealing { .. })
    }

    /// Full answer already received but not yet fully revealed.
    pub fn pending_assistant_text(&self) -> Option<&str> {
        match &self.reply {
            ReplyCycle::Revealing { full_text, .. } => Some(full_text),
            _ => None,
        }
    }

    /// Text the playback engine has revealed so far.
    pub fn revealed_text(&self) -> &str {
        self.typewriter.output()
    }

    pub fn is_playback_paused(&self) -> bool {
        self.is_revealing() && !self.typewriter.is_streaming() && !self.typewriter.is_finished()
    }

    // ==================== INTERNAL ====================

    async fn reload_conversations(&mut self) {
        self.conversations = match self.gateway.list_conversations().await {
            Ok(conversations) => conversations,
            Err(e) => {
                tracing::warn!("Failed to load conversation list: {}", e);
                Vec::new()
            }
        };
    }

    /// Create (or synthesize, for guests) a conversation with the given title.
    async fn open_conversation(
        &mut self,
        title: &str,
        assistant: AssistantType,
    ) -> Result<ConversationKey, SessionError> {
        if self.is_authenticated() {
            let conversation = self
                .gateway
                .create_conversation(Some(title.to_string()), assistant)
                .await?;
            let id = conversation.id;
            self.conversations.insert(0, conversation);
            Ok(ConversationKey::Persisted(id))
        } else {
            Ok(ConversationKey::Local(format!(
                "guest-{}",
                chrono::Utc::now().timestamp_millis()
            )))
        }
    }

    /// Lazily open a conversation when the user types before picking one.
    async fn ensure_active(&mut self) -> Result<(), SessionError> {
        if self.active.is_some() {
            return Ok(());
        }
        let assistant = AssistantType::default();
        let key = self
            .open_conversation(persona::DEFAULT_CONVERSATION_TITLE, assistant)
            .await?;
        self.store.set(ACTIVE_CONVERSATION_KEY, &key.storage_token());
        self.active = Some(ActiveConversation {
            key,
            assistant,
            title: persona::DEFAULT_CONVERSATION_TITLE.to_string(),
        });
        Ok(())
    }

    fn reset_selection(&mut self) {
        self.active = None;
        self.messages.clear();
        self.reactions.clear();
        self.reply = ReplyCycle::Idle;
        self.typewriter.stop();
    }

    fn reply_belongs(&self, pending: &PendingSend) -> bool {
        matches!(&self.reply, ReplyCycle::AwaitingReply { conversation, placeholder }
            if *conversation == pending.conversation && *placeholder == pending.placeholder)
    }

    fn apply_title(&mut self, id: Uuid, title: String) {
        if let Some(entry) = self.conversations.iter_mut().find(|c| c.id == id) {
            entry.title = title.clone();
        }
        if let Some(active) = self.active.as_mut() {
            if active.key == ConversationKey::Persisted(id) {
                active.title = title;
            }
        }
    }

    fn alloc_local_id(&mut self) -> u64 {
        let id = self.next_local_id;
        self.next_local_id += 1;
        id
    }

    fn push_message(&mut self, role: Role, text: &str) -> u64 {
        let local_id = self.alloc_local_id();
        self.messages.push(BufferedMessage {
            local_id,
            id: None,
            role,
            text: text.to_string(),
        });
        local_id
    }

    fn confirm_message(&mut self, local_id: u64, id: Uuid) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.local_id == local_id) {
            message.id = Some(id);
        }
    }

    fn set_message_text(&mut self, local_id: u64, text: &str) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.local_id == local_id) {
            message.text = text.to_string();
        }
    }
}
