//! Database models for chat messages.

use crate::types::{ConversationId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Role of a chat message, matching the `message_role` Postgres enum and the
/// wire format of the OpenAI-compatible completions API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "message_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct MessageCreateDBRequest {
    pub conversation_id: ConversationId,
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageDBResponse {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
