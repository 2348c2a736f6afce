//! HTTP implementation of the session controller's server boundary. Talks
//! to the /api surface of this service (or any compatible deployment) with
//! an optional bearer token.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::api::dto::{
    AiResponse, AppendMessageResponse, ConversationResponse, ConversationsResponse,
    MessagesResponse, OkResponse, SmartTitleResponse,
};
use crate::models::internal::{Conversation, Message, Reaction, Role};
use crate::models::persona::AssistantType;
use crate::session::gateway::{ChatGateway, GatewayError};

#[derive(Clone)]
pub struct HttpChatGateway {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpChatGateway {
    pub fn new(base_url: String, bearer_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(GatewayError::ApiError {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        Self::check(response).await
    }
}

#[async_trait]
impl ChatGateway for HttpChatGateway {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, GatewayError> {
        let response = self
            .request(reqwest::Method::GET, "/api/conversations")
            .send()
            .await?;
        let body: ConversationsResponse = Self::check(response).await?.json().await?;
        Ok(body.conversations)
    }

    async fn create_conversation(
        &self,
        title: Option<String>,
        assistant: AssistantType,
    ) -> Result<Conversation, GatewayError> {
        let body = serde_json::json!({
            "title": title,
            "assistant_type": assistant.as_str(),
        });
        let response = self.post_json("/api/conversations", &body).await?;
        let body: ConversationResponse = response.json().await?;
        Ok(body.conversation)
    }

    async fn rename_conversation(
        &self,
        id: Uuid,
        title: String,
    ) -> Result<Conversation, GatewayError> {
        let body = serde_json::json!({ "id": id, "title": title });
        let response = self
            .request(reqwest::Method::PUT, "/api/conversations")
            .json(&body)
            .send()
            .await?;
        let body: ConversationResponse = Self::check(response).await?.json().await?;
        Ok(body.conversation)
    }

    async fn delete_conversation(&self, id: Uuid) -> Result<(), GatewayError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/api/conversations/{}", id),
            )
            .send()
            .await?;
        let _: OkResponse = Self::check(response).await?.json().await?;
        Ok(())
    }

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, GatewayError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/api/messages/{}", conversation_id),
            )
            .send()
            .await?;
        let body: MessagesResponse = Self::check(response).await?.json().await?;
        let messages = body
            .messages
            .into_iter()
            .map(|m| Message {
                id: m.id,
                conversation_id,
                role: m.role,
                text: m.text,
                created_at: chrono::NaiveDateTime::parse_from_str(
                    &m.created_at,
                    "%Y-%m-%d %H:%M:%S%.f",
                )
                .unwrap_or_default(),
            })
            .collect();
        Ok(messages)
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        role: Role,
        text: String,
    ) -> Result<Uuid, GatewayError> {
        let body = serde_json::json!({ "role": role.as_str(), "text": text });
        let response = self
            .post_json(&format!("/api/messages/{}", conversation_id), &body)
            .await?;
        let body: AppendMessageResponse = response.json().await?;
        Ok(body.id)
    }

    async fn submit_feedback(
        &self,
        message_id: Uuid,
        reaction: Reaction,
    ) -> Result<(), GatewayError> {
        let body = serde_json::json!({ "reaction": reaction.as_str() });
        let response = self
            .post_json(&format!("/api/message-feedback/{}", message_id), &body)
            .await?;
        let _: OkResponse = response.json().await?;
        Ok(())
    }

    async fn generate_reply(
        &self,
        prompt: String,
        system_prompt: String,
    ) -> Result<String, GatewayError> {
        let body = serde_json::json!({ "prompt": prompt, "systemPrompt": system_prompt });
        let response = self.post_json("/api/ai", &body).await?;
        let body: AiResponse = response.json().await?;
        Ok(body.text)
    }

    async fn smart_title(
        &self,
        text: String,
        assistant: AssistantType,
    ) -> Result<String, GatewayError> {
        let body = serde_json::json!({ "text": text, "assistant_type": assistant.as_str() });
        let response = self.post_json("/api/smart-title", &body).await?;
        let body: SmartTitleResponse = response.json().await?;
        Ok(body.title)
    }
}
