use sea_orm::entity::prelude::*;

/// Conversation rows. Timestamps are stored as SQLite TEXT in
/// `%Y-%m-%d %H:%M:%S%.f` form and parsed at the repository boundary.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "conversations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: Option<String>,
    pub title: String,
    pub assistant_type: String,
    pub created_at: String,
    pub updated_at: String,
    pub last_message_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
