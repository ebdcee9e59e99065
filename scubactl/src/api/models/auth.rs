//! API models for authentication.

use crate::api::models::users::UserResponse;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Issued on login: both tokens plus the authenticated user.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProfileUpdateRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Simple acknowledgement body (logout, toggle-active).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AckResponse {
    pub message: String,
}
