//! Database models for system settings.

use crate::types::SettingId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct SettingCreateDBRequest {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SettingUpdateDBRequest {
    pub key: String,
    pub value: String,
    /// `None` leaves the stored description untouched.
    pub description: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SettingDBResponse {
    pub id: SettingId,
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
