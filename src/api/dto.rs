//! Wire types for the HTTP API. Request fields that the handlers validate
//! by hand are `Option` so a missing field produces a domain 400 instead of
//! a deserialization failure.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::internal::{Conversation, Role};

#[derive(Debug, Deserialize, Serialize, ToSchema, Default)]
pub struct CreateConversationRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub assistant_type: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RenameConversationRequest {
    pub id: Option<Uuid>,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AppendMessageRequest {
    pub role: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct FeedbackRequest {
    pub reaction: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AiRequest {
    pub prompt: Option<String>,
    #[serde(rename = "systemPrompt")]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SmartTitleRequest {
    pub text: Option<String>,
    #[serde(default)]
    pub assistant_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversationsResponse {
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversationResponse {
    pub conversation: Conversation,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageDto {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessagesResponse {
    pub messages: Vec<MessageDto>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AppendMessageResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AiResponse {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SmartTitleResponse {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
        }
    }
}
