//! API models for custom instructions.

use crate::db::models::instructions::InstructionDBResponse;
use crate::types::InstructionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InstructionCreateRequest {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InstructionUpdateRequest {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InstructionResponse {
    #[schema(value_type = Uuid)]
    pub id: InstructionId,
    pub name: String,
    pub content: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<InstructionDBResponse> for InstructionResponse {
    fn from(instruction: InstructionDBResponse) -> Self {
        Self {
            id: instruction.id,
            name: instruction.name,
            content: instruction.content,
            is_default: instruction.is_default,
            created_at: instruction.created_at,
            updated_at: instruction.updated_at,
        }
    }
}
