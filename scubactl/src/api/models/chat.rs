//! API models for conversations and messages.

use crate::ai::{ModelInfo, Usage};
use crate::db::models::{
    conversations::ConversationDBResponse,
    messages::{MessageDBResponse, MessageRole},
};
use crate::types::{ConversationId, InstructionId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationResponse {
    #[schema(value_type = Uuid)]
    pub id: ConversationId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConversationDBResponse> for ConversationResponse {
    fn from(conversation: ConversationDBResponse) -> Self {
        Self {
            id: conversation.id,
            title: conversation.title,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(value_type = Uuid)]
    pub id: MessageId,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<MessageDBResponse> for MessageResponse {
    fn from(message: MessageDBResponse) -> Self {
        Self {
            id: message.id,
            role: message.role,
            content: message.content,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConversationCreateRequest {
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConversationRenameRequest {
    pub title: String,
}

/// A conversation with its full message history, ascending by creation time.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConversationDetailResponse {
    #[serde(flatten)]
    pub conversation: ConversationResponse,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub content: String,
    /// Overrides the user's default custom instruction for this turn.
    #[serde(default)]
    #[schema(value_type = Option<Uuid>)]
    pub custom_instruction_id: Option<InstructionId>,
}

/// Both halves of a completed chat turn.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SendMessageResponse {
    pub user_message: MessageResponse,
    pub assistant_message: MessageResponse,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ModelsListResponse {
    pub models: Vec<ModelInfo>,
}
