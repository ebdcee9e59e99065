//! API models for users.

use crate::db::models::users::UserDBResponse;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The authenticated caller, decoded from verified JWT claims.
///
/// Extracted from the `Authorization: Bearer` header by the
/// `FromRequestParts` impl in `crate::auth::current_user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<&UserDBResponse> for CurrentUser {
    fn from(user: &UserDBResponse) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
        }
    }
}

/// A user as exposed over the API. Never includes the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = Uuid)]
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(user: UserDBResponse) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_admin: user.is_admin,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
