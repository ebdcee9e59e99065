//! Database models for custom instructions.

use crate::types::{InstructionId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct InstructionCreateDBRequest {
    pub user_id: UserId,
    pub name: String,
    pub content: String,
    pub is_default: bool,
}

#[derive(Debug, Clone)]
pub struct InstructionUpdateDBRequest {
    pub name: String,
    pub content: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct InstructionDBResponse {
    pub id: InstructionId,
    pub user_id: UserId,
    pub name: String,
    pub content: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
