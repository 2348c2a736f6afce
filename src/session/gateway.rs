use async_trait::async_trait;
use uuid::Uuid;

use crate::models::internal::{Conversation, Message, Reaction, Role};
use crate::models::persona::AssistantType;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Capability over the backend gateway the session controller depends on.
/// Mirrors the HTTP contract one-to-one; see [`crate::services::HttpChatGateway`]
/// for the wire implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, GatewayError>;

    async fn create_conversation(
        &self,
        title: Option<String>,
        assistant: AssistantType,
    ) -> Result<Conversation, GatewayError>;

    async fn rename_conversation(
        &self,
        id: Uuid,
        title: String,
    ) -> Result<Conversation, GatewayError>;

    async fn delete_conversation(&self, id: Uuid) -> Result<(), GatewayError>;

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, GatewayError>;

    async fn append_message(
        &self,
        conversation_id: Uuid,
        role: Role,
        text: String,
    ) -> Result<Uuid, GatewayError>;

    async fn submit_feedback(
        &self,
        message_id: Uuid,
        reaction: Reaction,
    ) -> Result<(), GatewayError>;

    async fn generate_reply(
        &self,
        prompt: String,
        system_prompt: String,
    ) -> Result<String, GatewayError>;

    async fn smart_title(
        &self,
        text: String,
        assistant: AssistantType,
    ) -> Result<String, GatewayError>;
}
