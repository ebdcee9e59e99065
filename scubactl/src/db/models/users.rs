//! Database models for users.

use crate::types::UserId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub password_hash: Option<String>,
}

/// Database request for updating a user
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
}

/// Database response for a user
#[derive(Debug, Clone, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
