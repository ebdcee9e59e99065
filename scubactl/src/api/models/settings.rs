//! API models for system settings, preferences, and data export.

use crate::api::models::{
    chat::{ConversationResponse, MessageResponse},
    instructions::InstructionResponse,
    users::UserResponse,
};
use crate::db::models::settings::SettingDBResponse;
use crate::types::SettingId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SystemSettingCreateRequest {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SystemSettingUpdateRequest {
    /// New key; omitted to keep the current one.
    #[serde(default)]
    pub key: Option<String>,
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SystemSettingResponse {
    #[schema(value_type = Uuid)]
    pub id: SettingId,
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SettingDBResponse> for SystemSettingResponse {
    fn from(setting: SettingDBResponse) -> Self {
        Self {
            id: setting.id,
            key: setting.key,
            value: setting.value,
            description: setting.description,
            created_at: setting.created_at,
            updated_at: setting.updated_at,
        }
    }
}

/// The user's effective chat preferences.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PreferencesResponse {
    pub user: UserResponse,
    /// `null` when no instruction is marked default.
    pub default_custom_instruction: Option<InstructionResponse>,
}

/// A conversation with its messages, as included in an export.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExportConversation {
    #[serde(flatten)]
    pub conversation: ConversationResponse,
    pub messages: Vec<MessageResponse>,
}

/// Everything the requesting user owns, in one document.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExportResponse {
    pub exported_at: DateTime<Utc>,
    pub user: UserResponse,
    pub custom_instructions: Vec<InstructionResponse>,
    pub conversations: Vec<ExportConversation>,
}
