use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::api::dto::*;
use crate::api::rate_limiter::{rate_limit_middleware, RateLimiter};
use crate::auth::{CurrentUser, MaybeUser, SessionProvider};
use crate::models::internal::Reaction;
use crate::models::persona::{AssistantType, DEFAULT_CONVERSATION_TITLE};
use crate::services::gemini::{GeminiClient, GeminiError};
use crate::services::smart_title::SmartTitler;
use crate::storage::repository::{ChatRepository, RepositoryError};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const MAX_TITLE_INPUT: usize = 120;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn ChatRepository>,
    pub llm: Arc<GeminiClient>,
    pub titler: Arc<SmartTitler>,
    pub sessions: Arc<dyn SessionProvider>,
    pub ai_limiter: RateLimiter,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn err(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

fn parse_assistant(tag: Option<&str>) -> Result<AssistantType, ApiError> {
    match tag {
        None | Some("") => Ok(AssistantType::default()),
        Some(tag) => tag
            .parse()
            .map_err(|_| err(StatusCode::BAD_REQUEST, "Invalid assistant type")),
    }
}

// ==================== CONVERSATIONS ====================

pub async fn list_conversations(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<Json<ConversationsResponse>, ApiError> {
    let Some(user) = user else {
        // Guests have no server-side history.
        return Ok(Json(ConversationsResponse {
            conversations: Vec::new(),
        }));
    };

    let conversations = state.repo.list_for_user(&user.id).await.map_err(|e| {
        tracing::error!("Failed to list conversations: {}", e);
        err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(ConversationsResponse { conversations }))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationResponse>), ApiError> {
    let assistant = parse_assistant(req.assistant_type.as_deref())?;

    let title = match req.title.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.chars().take(MAX_TITLE_INPUT).collect::<String>(),
        _ => DEFAULT_CONVERSATION_TITLE.to_string(),
    };

    let conversation = state
        .repo
        .create(&user.id, &title, assistant)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create conversation: {}", e);
            err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    Ok((StatusCode::CREATED, Json(ConversationResponse { conversation })))
}

pub async fn rename_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<RenameConversationRequest>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let id = req
        .id
        .ok_or_else(|| err(StatusCode::BAD_REQUEST, "Missing conversation id"))?;
    let title = match req.title.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return Err(err(StatusCode::BAD_REQUEST, "Missing title")),
    };

    let conversation = state
        .repo
        .rename(id, &user.id, title)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound(_) => err(StatusCode::NOT_FOUND, "Conversation not found"),
            RepositoryError::InvalidInput(m) => err(StatusCode::BAD_REQUEST, m),
            e => {
                tracing::error!("Failed to rename conversation: {}", e);
                err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        })?;
    Ok(Json(ConversationResponse { conversation }))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    state.repo.delete(id, &user.id).await.map_err(|e| match e {
        RepositoryError::NotFound(_) => err(StatusCode::NOT_FOUND, "Conversation not found"),
        e => {
            tracing::error!("Failed to delete conversation: {}", e);
            err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    })?;
    Ok(Json(OkResponse { ok: true }))
}

// ==================== MESSAGES ====================

pub async fn list_messages(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<Uuid>,
) -> Json<MessagesResponse> {
    let messages = match user {
        Some(user) => match state.repo.messages(id, &user.id).await {
            Ok(messages) => messages,
            Err(e) => {
                // History is non-critical; an empty list keeps the client usable.
                tracing::warn!("Failed to load messages for {}: {}", id, e);
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    Json(MessagesResponse {
        messages: messages
            .into_iter()
            .map(|m| MessageDto {
                id: m.id,
                role: m.role,
                text: m.text,
                created_at: m.created_at.format(TS_FORMAT).to_string(),
            })
            .collect(),
    })
}

pub async fn append_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AppendMessageRequest>,
) -> Result<Json<AppendMessageResponse>, ApiError> {
    let text = match req.text.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return Err(err(StatusCode::BAD_REQUEST, "Missing text")),
    };
    let role = req
        .role
        .as_deref()
        .and_then(crate::models::internal::Role::parse)
        .ok_or_else(|| err(StatusCode::BAD_REQUEST, "Invalid role"))?;

    let message_id = state
        .repo
        .append_message(id, &user.id, role, text)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound(_) => err(StatusCode::FORBIDDEN, "Forbidden"),
            RepositoryError::InvalidInput(m) => err(StatusCode::BAD_REQUEST, m),
            e => {
                tracing::error!("Failed to append message: {}", e);
                err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        })?;
    Ok(Json(AppendMessageResponse { id: message_id }))
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let reaction = req
        .reaction
        .as_deref()
        .and_then(Reaction::parse)
        .ok_or_else(|| err(StatusCode::BAD_REQUEST, "Invalid reaction"))?;

    state
        .repo
        .upsert_feedback(id, &user.id, reaction)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound(_) => err(StatusCode::NOT_FOUND, "Message not found"),
            e => {
                tracing::error!("Failed to store feedback: {}", e);
                err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        })?;
    Ok(Json(OkResponse { ok: true }))
}

// ==================== AI RELAY ====================

fn map_gemini_error(e: GeminiError) -> ApiError {
    match e {
        GeminiError::MissingApiKey => {
            err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        GeminiError::Upstream { status, body } => {
            tracing::error!("Upstream AI error {}: {}", status, body);
            err(StatusCode::BAD_GATEWAY, body)
        }
        e => {
            tracing::error!("AI relay failed: {}", e);
            err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub async fn ai_generate(
    State(state): State<AppState>,
    Json(req): Json<AiRequest>,
) -> Result<Json<AiResponse>, ApiError> {
    let prompt = match req.prompt.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => p,
        _ => return Err(err(StatusCode::BAD_REQUEST, "Missing prompt")),
    };

    let system_prompt = match req.system_prompt.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => AssistantType::default().system_prompt(),
    };

    let text = state
        .llm
        .generate(prompt, &system_prompt)
        .await
        .map_err(map_gemini_error)?;
    Ok(Json(AiResponse { text }))
}

pub async fn smart_title(
    State(state): State<AppState>,
    Json(req): Json<SmartTitleRequest>,
) -> Result<Json<SmartTitleResponse>, ApiError> {
    let text = match req.text.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return Err(err(StatusCode::BAD_REQUEST, "Missing text")),
    };
    let assistant = parse_assistant(req.assistant_type.as_deref())?;

    let title = state
        .titler
        .title_for(text, assistant)
        .await
        .map_err(map_gemini_error)?;
    Ok(Json(SmartTitleResponse { title }))
}

pub async fn health() -> &'static str {
    "OK"
}

pub fn create_router(state: AppState) -> Router {
    // The relay endpoints call a metered upstream; only they are throttled.
    let relay = Router::new()
        .route("/api/ai", post(ai_generate))
        .route("/api/smart-title", post(smart_title))
        .route_layer(middleware::from_fn_with_state(
            state.ai_limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route(
            "/api/conversations",
            get(list_conversations)
                .post(create_conversation)
                .put(rename_conversation),
        )
        .route("/api/conversations/{id}", delete(delete_conversation))
        .route("/api/messages/{id}", get(list_messages).post(append_message))
        .route("/api/message-feedback/{id}", post(submit_feedback))
        .merge(relay)
        .route("/health", get(health))
        .layer(Extension(state.sessions.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
