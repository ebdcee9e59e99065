//! Authentication and account management handlers.

use crate::api::models::auth::{
    AckResponse, ChangePasswordRequest, LoginRequest, LoginResponse, ProfileUpdateRequest, RefreshResponse,
    RegisterRequest,
};
use crate::api::models::users::{CurrentUser, UserResponse};
use crate::auth::{current_user::bearer_token, password, require_admin, session};
use crate::config::PasswordConfig;
use crate::db::handlers::users::{UserFilter, Users};
use crate::db::handlers::repository::Repository;
use crate::db::models::users::{UserCreateDBRequest, UserUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::types::UserId;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};

fn validate_username(username: &str) -> Result<()> {
    if username.len() < 3 {
        return Err(Error::BadRequest {
            message: "Username must be at least 3 characters long".to_string(),
        });
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(Error::BadRequest {
            message: "Username can only contain letters, numbers, hyphens and underscores".to_string(),
        });
    }
    Ok(())
}

fn validate_password(password: &str, rules: &PasswordConfig) -> Result<()> {
    if password.len() < rules.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters long", rules.min_length),
        });
    }
    if password.len() > rules.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at most {} characters long", rules.max_length),
        });
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
    });
    if !valid {
        return Err(Error::BadRequest {
            message: "Invalid email address".to_string(),
        });
    }
    Ok(())
}

/// Argon2 hashing is CPU-bound, so keep it off the async worker threads.
async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || password::hash_string(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("join password hashing task: {e}"),
        })?
}

async fn verify_password_blocking(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || password::verify_string(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("join password verification task: {e}"),
        })?
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    summary = "Register a new account",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid username, email, or password"),
        (status = 403, description = "Registration disabled"),
        (status = 409, description = "Username or email already exists"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %request.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    if !state.config.auth.allow_registration {
        return Err(Error::Forbidden);
    }

    let username = request.username.trim().to_string();
    let email = request.email.trim().to_lowercase();
    validate_username(&username)?;
    validate_email(&email)?;
    validate_password(&request.password, &state.config.auth.password)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    if users.get_by_username(&username).await?.is_some() {
        return Err(Error::Conflict {
            message: "Username already exists".to_string(),
        });
    }
    if users.get_by_email(&email).await?.is_some() {
        return Err(Error::Conflict {
            message: "Email already exists".to_string(),
        });
    }

    let password_hash = hash_password_blocking(request.password).await?;

    let mut users = Users::new(&mut conn);
    let user = users
        .create(&UserCreateDBRequest {
            username,
            email,
            is_admin: false,
            password_hash: Some(password_hash),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    summary = "Log in with username and password",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Tokens issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials or disabled account"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %request.username))]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<LoginResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).get_by_username(request.username.trim()).await?;

    let invalid_credentials = || Error::Unauthenticated {
        message: Some("Invalid credentials".to_string()),
    };

    let user = user.ok_or_else(invalid_credentials)?;
    let hash = user.password_hash.clone().ok_or_else(invalid_credentials)?;

    if !verify_password_blocking(request.password, hash).await? {
        return Err(invalid_credentials());
    }

    if !user.is_active {
        return Err(Error::Unauthenticated {
            message: Some("Account is disabled".to_string()),
        });
    }

    let current = CurrentUser::from(&user);
    let access_token = session::create_access_token(&current, &state.config)?;
    let refresh_token = session::create_refresh_token(&current, &state.config)?;

    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
        user: UserResponse::from(user),
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "auth",
    summary = "Exchange a refresh token for a new access token",
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Missing or invalid refresh token"),
        (status = 404, description = "User no longer exists or is disabled"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<RefreshResponse>> {
    let token = match bearer_token(&headers) {
        Some(token) => token?,
        None => return Err(Error::Unauthenticated { message: None }),
    };
    let claims = session::verify_token(token, session::TokenUse::Refresh, &state.config)?;

    // The account may have been disabled or deleted since the refresh token
    // was issued, so always re-read it.
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_by_id(claims.sub)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| Error::not_found("User"))?;

    let access_token = session::create_access_token(&CurrentUser::from(&user), &state.config)?;
    Ok(Json(RefreshResponse { access_token }))
}

#[utoipa::path(
    get,
    path = "/api/auth/profile",
    tag = "auth",
    summary = "Get the current user's profile",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User no longer exists"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_profile(State(state): State<AppState>, user: CurrentUser) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| Error::not_found("User"))?;
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    put,
    path = "/api/auth/profile",
    tag = "auth",
    summary = "Update the current user's email",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Invalid email"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Email already in use"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ProfileUpdateRequest>,
) -> Result<Json<UserResponse>> {
    let email = request.email.trim().to_lowercase();
    validate_email(&email)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    if let Some(existing) = users.get_by_email(&email).await?
        && existing.id != user.id
    {
        return Err(Error::Conflict {
            message: "Email already exists".to_string(),
        });
    }

    let mut users = Users::new(&mut conn);
    let updated = users
        .update(
            user.id,
            &UserUpdateDBRequest {
                email: Some(email),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(UserResponse::from(updated)))
}

#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    tag = "auth",
    summary = "Change the current user's password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = AckResponse),
        (status = 400, description = "Current password incorrect or new password invalid"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<AckResponse>> {
    validate_password(&request.new_password, &state.config.auth.password)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let stored = Users::new(&mut conn)
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| Error::not_found("User"))?;

    let hash = stored.password_hash.clone().ok_or_else(|| Error::BadRequest {
        message: "Current password is incorrect".to_string(),
    })?;
    if !verify_password_blocking(request.current_password, hash).await? {
        return Err(Error::BadRequest {
            message: "Current password is incorrect".to_string(),
        });
    }

    let password_hash = hash_password_blocking(request.new_password).await?;
    Users::new(&mut conn)
        .update(
            user.id,
            &UserUpdateDBRequest {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(AckResponse {
        message: "Password changed successfully".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    summary = "Log out",
    description = "Tokens are stateless, so this is an acknowledgement; clients discard their tokens.",
    responses(
        (status = 200, description = "Acknowledged", body = AckResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn logout(user: CurrentUser) -> Json<AckResponse> {
    Json(AckResponse {
        message: "Successfully logged out".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/api/auth/users",
    tag = "auth",
    summary = "List all users (admin only)",
    responses(
        (status = 200, description = "All users", body = Vec<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_users(State(state): State<AppState>, user: CurrentUser) -> Result<Json<Vec<UserResponse>>> {
    require_admin(&user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let users = Users::new(&mut conn).list(&UserFilter::new(0, 1000)).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/auth/users/{id}/toggle-active",
    tag = "auth",
    summary = "Enable or disable a user account (admin only)",
    params(("id" = Uuid, Path, description = "User to toggle")),
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Cannot disable your own account"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, target = %id))]
pub async fn toggle_user_active(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<UserId>,
) -> Result<Json<UserResponse>> {
    require_admin(&user)?;

    if id == user.id {
        return Err(Error::BadRequest {
            message: "Cannot disable your own account".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let target = Users::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("User"))?;

    let updated = Users::new(&mut conn)
        .update(
            id,
            &UserUpdateDBRequest {
                is_active: Some(!target.is_active),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(UserResponse::from(updated)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_validation() {
        assert!(validate_username("diver-1_a").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("nope!").is_err());
    }

    #[test]
    fn test_password_validation() {
        let rules = PasswordConfig::default();
        assert!(validate_password("secret", &rules).is_ok());
        assert!(validate_password("short", &rules).is_err());
        assert!(validate_password(&"x".repeat(200), &rules).is_err());
    }

    #[test]
    fn test_email_validation() {
        assert!(validate_email("diver@example.com").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("diver@nodot").is_err());
        assert!(validate_email("diver@.com").is_err());
    }
}
