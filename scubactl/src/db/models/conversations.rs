//! Database models for conversations.

use crate::types::{ConversationId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct ConversationCreateDBRequest {
    pub user_id: UserId,
    pub title: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct ConversationDBResponse {
    pub id: ConversationId,
    pub user_id: UserId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
