use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::sea_query::OnConflict;
use sea_orm::{prelude::*, QueryOrder, Set, TransactionError, TransactionTrait};
use uuid::Uuid;

use crate::models::internal::{Conversation, Message, Reaction, Role};
use crate::models::persona::AssistantType;
use crate::storage::entities::{conversations, message_feedback, messages};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DbError(#[from] sea_orm::DbErr),
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Persistence boundary for the chat service. Every operation that reads or
/// mutates a conversation is scoped to its owner.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, RepositoryError>;

    async fn create(
        &self,
        user_id: &str,
        title: &str,
        assistant: AssistantType,
    ) -> Result<Conversation, RepositoryError>;

    async fn rename(
        &self,
        id: Uuid,
        user_id: &str,
        title: &str,
    ) -> Result<Conversation, RepositoryError>;

    async fn delete(&self, id: Uuid, user_id: &str) -> Result<(), RepositoryError>;

    async fn find_by_id(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<Conversation>, RepositoryError>;

    async fn messages(
        &self,
        conversation_id: Uuid,
        user_id: &str,
    ) -> Result<Vec<Message>, RepositoryError>;

    async fn append_message(
        &self,
        conversation_id: Uuid,
        user_id: &str,
        role: Role,
        text: &str,
    ) -> Result<Uuid, RepositoryError>;

    async fn upsert_feedback(
        &self,
        message_id: Uuid,
        user_id: &str,
        reaction: Reaction,
    ) -> Result<(), RepositoryError>;

    async fn feedback_for(
        &self,
        message_id: Uuid,
        user_id: &str,
    ) -> Result<Option<Reaction>, RepositoryError>;
}

pub struct SeaOrmChatRepository {
    db: DatabaseConnection,
}

impl SeaOrmChatRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn owned_conversation(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> Result<conversations::Model, RepositoryError> {
        conversations::Entity::find_by_id(id.to_string())
            .filter(conversations::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("conversation {}", id)))
    }

    /// Bump last_message_at so the list reorders. Best effort: an append
    /// must not fail because the bump did.
    async fn touch_last_message(&self, conversation_id: Uuid, at: &str) {
        let active = conversations::ActiveModel {
            id: Set(conversation_id.to_string()),
            last_message_at: Set(at.to_string()),
            updated_at: Set(at.to_string()),
            ..Default::default()
        };
        if let Err(e) = active.update(&self.db).await {
            tracing::warn!(
                "Failed to bump last_message_at for {}: {}",
                conversation_id,
                e
            );
        }
    }
}

#[async_trait]
impl ChatRepository for SeaOrmChatRepository {
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = conversations::Entity::find()
            .filter(conversations::Column::UserId.eq(user_id))
            .order_by_desc(conversations::Column::LastMessageAt)
            .order_by_desc(conversations::Column::UpdatedAt)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Conversation::from).collect())
    }

    async fn create(
        &self,
        user_id: &str,
        title: &str,
        assistant: AssistantType,
    ) -> Result<Conversation, RepositoryError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(RepositoryError::InvalidInput("title is empty".to_string()));
        }
        let now = chrono::Utc::now().naive_utc().format(TS_FORMAT).to_string();
        let active = conversations::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(Some(user_id.to_string())),
            title: Set(title.to_string()),
            assistant_type: Set(assistant.as_str().to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            last_message_at: Set(now),
        };
        let model = active.insert(&self.db).await?;
        tracing::info!("Created conversation {} for {}", model.id, user_id);
        Ok(Conversation::from(model))
    }

    async fn rename(
        &self,
        id: Uuid,
        user_id: &str,
        title: &str,
    ) -> Result<Conversation, RepositoryError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(RepositoryError::InvalidInput("title is empty".to_string()));
        }
        let current = self.owned_conversation(id, user_id).await?;
        let now = chrono::Utc::now().naive_utc().format(TS_FORMAT).to_string();

        let mut active: conversations::ActiveModel = current.into();
        active.title = Set(title.to_string());
        active.updated_at = Set(now);
        let model = active.update(&self.db).await?;
        Ok(Conversation::from(model))
    }

    async fn delete(&self, id: Uuid, user_id: &str) -> Result<(), RepositoryError> {
        self.owned_conversation(id, user_id).await?;

        // The cascade must not leave a conversation half-deleted.
        self.db
            .transaction::<_, (), sea_orm::DbErr>(|txn| {
                Box::pin(async move {
                    let message_ids: Vec<String> = messages::Entity::find()
                        .filter(messages::Column::ConversationId.eq(id.to_string()))
                        .all(txn)
                        .await?
                        .into_iter()
                        .map(|m| m.id)
                        .collect();

                    if !message_ids.is_empty() {
                        message_feedback::Entity::delete_many()
                            .filter(message_feedback::Column::MessageId.is_in(message_ids))
                            .exec(txn)
                            .await?;
                    }
                    messages::Entity::delete_many()
                        .filter(messages::Column::ConversationId.eq(id.to_string()))
                        .exec(txn)
                        .await?;
                    conversations::Entity::delete_by_id(id.to_string())
                        .exec(txn)
                        .await?;
                    Ok(())
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(e) | TransactionError::Transaction(e) => {
                    RepositoryError::DbError(e)
                }
            })?;
        tracing::info!("Deleted conversation {}", id);
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<Conversation>, RepositoryError> {
        match self.owned_conversation(id, user_id).await {
            Ok(model) => Ok(Some(Conversation::from(model))),
            Err(RepositoryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn messages(
        &self,
        conversation_id: Uuid,
        user_id: &str,
    ) -> Result<Vec<Message>, RepositoryError> {
        self.owned_conversation(conversation_id, user_id).await?;
        let rows = messages::Entity::find()
            .filter(messages::Column::ConversationId.eq(conversation_id.to_string()))
            .order_by_asc(messages::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        user_id: &str,
        role: Role,
        text: &str,
    ) -> Result<Uuid, RepositoryError> {
        if text.trim().is_empty() {
            return Err(RepositoryError::InvalidInput("text is empty".to_string()));
        }
        self.owned_conversation(conversation_id, user_id).await?;

        let id = Uuid::new_v4();
        let now = chrono::Utc::now().naive_utc().format(TS_FORMAT).to_string();
        let active = messages::ActiveModel {
            id: Set(id.to_string()),
            conversation_id: Set(conversation_id.to_string()),
            role: Set(role.as_str().to_string()),
            content: Set(text.to_string()),
            created_at: Set(now.clone()),
        };
        active.insert(&self.db).await?;

        self.touch_last_message(conversation_id, &now).await;
        Ok(id)
    }

    async fn upsert_feedback(
        &self,
        message_id: Uuid,
        user_id: &str,
        reaction: Reaction,
    ) -> Result<(), RepositoryError> {
        let message = messages::Entity::find_by_id(message_id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("message {}", message_id)))?;

        // The message must live in a conversation the caller owns.
        let owned = conversations::Entity::find_by_id(message.conversation_id)
            .filter(conversations::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        if owned.is_none() {
            return Err(RepositoryError::NotFound(format!("message {}", message_id)));
        }

        let now = chrono::Utc::now().naive_utc().format(TS_FORMAT).to_string();
        let active = message_feedback::ActiveModel {
            message_id: Set(message_id.to_string()),
            user_id: Set(user_id.to_string()),
            reaction: Set(reaction.as_str().to_string()),
            created_at: Set(now),
        };
        message_feedback::Entity::insert(active)
            .on_conflict(
                OnConflict::columns([
                    message_feedback::Column::MessageId,
                    message_feedback::Column::UserId,
                ])
                .update_columns([
                    message_feedback::Column::Reaction,
                    message_feedback::Column::CreatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn feedback_for(
        &self,
        message_id: Uuid,
        user_id: &str,
    ) -> Result<Option<Reaction>, RepositoryError> {
        let row = message_feedback::Entity::find_by_id((
            message_id.to_string(),
            user_id.to_string(),
        ))
        .one(&self.db)
        .await?;
        Ok(row.and_then(|r| Reaction::parse(&r.reaction)))
    }
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).unwrap_or_default()
}

impl From<conversations::Model> for Conversation {
    fn from(model: conversations::Model) -> Self {
        Conversation {
            id: Uuid::parse_str(&model.id).unwrap_or_default(),
            user_id: model.user_id,
            title: model.title,
            assistant_type: model.assistant_type.parse().unwrap_or_default(),
            created_at: parse_ts(&model.created_at),
            updated_at: parse_ts(&model.updated_at),
            last_message_at: parse_ts(&model.last_message_at),
        }
    }
}

impl From<messages::Model> for Message {
    fn from(model: messages::Model) -> Self {
        Message {
            id: Uuid::parse_str(&model.id).unwrap_or_default(),
            conversation_id: Uuid::parse_str(&model.conversation_id).unwrap_or_default(),
            // Legacy rows may still carry the "bot" alias.
            role: Role::parse(&model.role).unwrap_or(Role::Assistant),
            text: model.content,
            created_at: parse_ts(&model.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::init_db;

    async fn repo() -> SeaOrmChatRepository {
        let db = init_db("sqlite::memory:").await.unwrap();
        SeaOrmChatRepository::new(db)
    }

    #[tokio::test]
    async fn create_and_list_scoped_to_owner() {
        let repo = repo().await;
        repo.create("alice", "Tư vấn tuyển sinh", AssistantType::TuyenSinh)
            .await
            .unwrap();
        repo.create("bob", "Hỗ trợ người học", AssistantType::HocTap)
            .await
            .unwrap();

        let alice = repo.list_for_user("alice").await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].title, "Tư vấn tuyển sinh");
        assert_eq!(alice[0].assistant_type, AssistantType::TuyenSinh);
        assert!(repo.list_for_user("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_orders_by_last_message_desc() {
        let repo = repo().await;
        let first = repo
            .create("u", "Cuộc trò chuyện mới", AssistantType::TuyenSinh)
            .await
            .unwrap();
        let second = repo
            .create("u", "Cuộc trò chuyện mới", AssistantType::TuyenSinh)
            .await
            .unwrap();

        // Activity in the older conversation moves it to the front.
        repo.append_message(first.id, "u", Role::User, "xin chào")
            .await
            .unwrap();

        let list = repo.list_for_user("u").await.unwrap();
        assert_eq!(list[0].id, first.id);
        assert_eq!(list[1].id, second.id);
        assert!(list[0].last_message_at > list[1].last_message_at);
    }

    #[tokio::test]
    async fn list_breaks_last_message_ties_on_updated_at() {
        let repo = repo().await;
        let older = repo
            .create("u", "Cuộc trò chuyện mới", AssistantType::TuyenSinh)
            .await
            .unwrap();
        let newer = repo
            .create("u", "Cuộc trò chuyện mới", AssistantType::TuyenSinh)
            .await
            .unwrap();

        // Pin both rows to the same last_message_at so only updated_at
        // decides the order.
        let shared = "2025-01-02 03:04:05.000";
        for id in [older.id, newer.id] {
            let active = conversations::ActiveModel {
                id: Set(id.to_string()),
                last_message_at: Set(shared.to_string()),
                ..Default::default()
            };
            active.update(&repo.db).await.unwrap();
        }

        // Renaming bumps updated_at, which should move the older
        // conversation to the front despite the tie.
        repo.rename(older.id, "u", "Điểm chuẩn 2024").await.unwrap();

        let list = repo.list_for_user("u").await.unwrap();
        assert_eq!(list[0].id, older.id);
        assert_eq!(list[1].id, newer.id);
        assert_eq!(list[0].last_message_at, list[1].last_message_at);
    }

    #[tokio::test]
    async fn messages_come_back_in_insertion_order_with_bot_normalized() {
        let repo = repo().await;
        let conv = repo
            .create("u", "Cuộc trò chuyện mới", AssistantType::TuyenSinh)
            .await
            .unwrap();

        repo.append_message(conv.id, "u", Role::User, "câu hỏi")
            .await
            .unwrap();
        repo.append_message(conv.id, "u", Role::Assistant, "trả lời")
            .await
            .unwrap();

        let messages = repo.messages(conv.id, "u").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn append_rejects_foreign_conversation_and_empty_text() {
        let repo = repo().await;
        let conv = repo
            .create("owner", "Cuộc trò chuyện mới", AssistantType::HocTap)
            .await
            .unwrap();

        assert!(matches!(
            repo.append_message(conv.id, "intruder", Role::User, "hi").await,
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            repo.append_message(conv.id, "owner", Role::User, "   ").await,
            Err(RepositoryError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn feedback_upserts_one_row_per_user() {
        let repo = repo().await;
        let conv = repo
            .create("u", "Cuộc trò chuyện mới", AssistantType::TuyenSinh)
            .await
            .unwrap();
        let message_id = repo
            .append_message(conv.id, "u", Role::Assistant, "trả lời")
            .await
            .unwrap();

        repo.upsert_feedback(message_id, "u", Reaction::Like)
            .await
            .unwrap();
        repo.upsert_feedback(message_id, "u", Reaction::Dislike)
            .await
            .unwrap();

        assert_eq!(
            repo.feedback_for(message_id, "u").await.unwrap(),
            Some(Reaction::Dislike)
        );

        let rows = message_feedback::Entity::find()
            .all(&repo.db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn delete_cascades_messages_and_feedback() {
        let repo = repo().await;
        let conv = repo
            .create("u", "Cuộc trò chuyện mới", AssistantType::TuyenSinh)
            .await
            .unwrap();
        let message_id = repo
            .append_message(conv.id, "u", Role::Assistant, "trả lời")
            .await
            .unwrap();
        repo.upsert_feedback(message_id, "u", Reaction::Like)
            .await
            .unwrap();

        repo.delete(conv.id, "u").await.unwrap();

        assert!(repo.find_by_id(conv.id, "u").await.unwrap().is_none());
        assert!(messages::Entity::find().all(&repo.db).await.unwrap().is_empty());
        assert!(message_feedback::Entity::find()
            .all(&repo.db)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn failed_delete_leaves_conversation_intact() {
        let repo = repo().await;
        let conv = repo
            .create("u", "Cuộc trò chuyện mới", AssistantType::TuyenSinh)
            .await
            .unwrap();
        let message_id = repo
            .append_message(conv.id, "u", Role::Assistant, "trả lời")
            .await
            .unwrap();
        repo.upsert_feedback(message_id, "u", Reaction::Like)
            .await
            .unwrap();

        assert!(matches!(
            repo.delete(conv.id, "intruder").await,
            Err(RepositoryError::NotFound(_))
        ));

        assert!(repo.find_by_id(conv.id, "u").await.unwrap().is_some());
        assert_eq!(repo.messages(conv.id, "u").await.unwrap().len(), 1);
        assert_eq!(
            repo.feedback_for(message_id, "u").await.unwrap(),
            Some(Reaction::Like)
        );
    }

    #[tokio::test]
    async fn rename_requires_ownership_and_nonempty_title() {
        let repo = repo().await;
        let conv = repo
            .create("u", "Cuộc trò chuyện mới", AssistantType::TuyenSinh)
            .await
            .unwrap();

        assert!(matches!(
            repo.rename(conv.id, "other", "Mới").await,
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            repo.rename(conv.id, "u", "  ").await,
            Err(RepositoryError::InvalidInput(_))
        ));

        let renamed = repo.rename(conv.id, "u", "Điểm chuẩn 2024").await.unwrap();
        assert_eq!(renamed.title, "Điểm chuẩn 2024");
    }
}
