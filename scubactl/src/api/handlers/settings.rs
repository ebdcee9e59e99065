//! System settings, preferences, and data export handlers.
//!
//! System settings are readable by any authenticated user but only admins may
//! mutate them. `GET /api/settings/system/{key}` shares a route with the
//! id-addressed PUT/DELETE; the GET handler takes the path segment as a key
//! string while the mutating handlers parse it as a UUID.

use crate::api::models::settings::{
    ExportConversation, ExportResponse, PreferencesResponse, SystemSettingCreateRequest, SystemSettingResponse,
    SystemSettingUpdateRequest,
};
use crate::api::models::users::{CurrentUser, UserResponse};
use crate::api::models::{chat::ConversationResponse, chat::MessageResponse, instructions::InstructionResponse};
use crate::db::handlers::{
    conversations::Conversations,
    instructions::CustomInstructions,
    messages::Messages,
    repository::Repository,
    settings::{SettingFilter, SystemSettings},
    users::Users,
};
use crate::db::models::settings::{SettingCreateDBRequest, SettingUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::types::SettingId;
use crate::AppState;
use crate::auth::require_admin;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

#[utoipa::path(
    get,
    path = "/api/settings/system",
    tag = "settings",
    summary = "List all system settings",
    responses(
        (status = 200, description = "All settings, ordered by key", body = Vec<SystemSettingResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_system_settings(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<SystemSettingResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let settings = SystemSettings::new(&mut conn).list(&SettingFilter::default()).await?;
    Ok(Json(settings.into_iter().map(SystemSettingResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/settings/system",
    tag = "settings",
    summary = "Create a system setting (admin only)",
    request_body = SystemSettingCreateRequest,
    responses(
        (status = 201, description = "Setting created", body = SystemSettingResponse),
        (status = 400, description = "Empty key"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required"),
        (status = 409, description = "Key already exists"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, key = %request.key))]
pub async fn create_system_setting(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<SystemSettingCreateRequest>,
) -> Result<(StatusCode, Json<SystemSettingResponse>)> {
    require_admin(&user)?;

    let key = request.key.trim();
    if key.is_empty() {
        return Err(Error::BadRequest {
            message: "Key cannot be empty".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    // The unique index on `key` turns a duplicate into a 409 via DbError.
    let setting = SystemSettings::new(&mut conn)
        .create(&SettingCreateDBRequest {
            key: key.to_string(),
            value: request.value,
            description: request.description,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(SystemSettingResponse::from(setting))))
}

#[utoipa::path(
    get,
    path = "/api/settings/system/{key}",
    tag = "settings",
    summary = "Look up a system setting by key",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 200, description = "Setting", body = SystemSettingResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Setting not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, key = %key))]
pub async fn get_system_setting(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(key): Path<String>,
) -> Result<Json<SystemSettingResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let setting = SystemSettings::new(&mut conn)
        .get_by_key(&key)
        .await?
        .ok_or_else(|| Error::not_found("System setting"))?;
    Ok(Json(SystemSettingResponse::from(setting)))
}

#[utoipa::path(
    put,
    path = "/api/settings/system/{id}",
    tag = "settings",
    summary = "Update a system setting (admin only)",
    params(("id" = Uuid, Path, description = "Setting id")),
    request_body = SystemSettingUpdateRequest,
    responses(
        (status = 200, description = "Updated setting", body = SystemSettingResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Setting not found"),
        (status = 409, description = "New key already exists"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, setting_id = %id))]
pub async fn update_system_setting(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<SettingId>,
    Json(request): Json<SystemSettingUpdateRequest>,
) -> Result<Json<SystemSettingResponse>> {
    require_admin(&user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let existing = SystemSettings::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("System setting"))?;

    let setting = SystemSettings::new(&mut conn)
        .update(
            id,
            &SettingUpdateDBRequest {
                key: request.key.unwrap_or(existing.key),
                value: request.value,
                description: request.description,
            },
        )
        .await?;

    Ok(Json(SystemSettingResponse::from(setting)))
}

#[utoipa::path(
    delete,
    path = "/api/settings/system/{id}",
    tag = "settings",
    summary = "Delete a system setting (admin only)",
    params(("id" = Uuid, Path, description = "Setting id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Setting not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, setting_id = %id))]
pub async fn delete_system_setting(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<SettingId>,
) -> Result<StatusCode> {
    require_admin(&user)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let deleted = SystemSettings::new(&mut conn).delete(id).await?;
    if !deleted {
        return Err(Error::not_found("System setting"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/settings/preferences",
    tag = "settings",
    summary = "Get the current user's chat preferences",
    responses(
        (status = 200, description = "User and their default custom instruction", body = PreferencesResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User no longer exists"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_preferences(State(state): State<AppState>, user: CurrentUser) -> Result<Json<PreferencesResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let stored = Users::new(&mut conn)
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| Error::not_found("User"))?;
    let default_instruction = CustomInstructions::new(&mut conn).get_default_for_user(user.id).await?;

    Ok(Json(PreferencesResponse {
        user: UserResponse::from(stored),
        default_custom_instruction: default_instruction.map(InstructionResponse::from),
    }))
}

#[utoipa::path(
    get,
    path = "/api/settings/export",
    tag = "settings",
    summary = "Export everything the current user owns",
    responses(
        (status = 200, description = "User, instructions, and all conversations with messages", body = ExportResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User no longer exists"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn export_data(State(state): State<AppState>, user: CurrentUser) -> Result<Json<ExportResponse>> {
    // One transaction so the export is a consistent snapshot.
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let stored = Users::new(&mut tx)
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| Error::not_found("User"))?;
    let instructions = CustomInstructions::new(&mut tx).list_for_user(user.id).await?;
    let conversations = Conversations::new(&mut tx).list_for_user(user.id).await?;

    let mut exported = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let messages = Messages::new(&mut tx).list_for_conversation(conversation.id).await?;
        exported.push(ExportConversation {
            conversation: ConversationResponse::from(conversation),
            messages: messages.into_iter().map(MessageResponse::from).collect(),
        });
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ExportResponse {
        exported_at: Utc::now(),
        user: UserResponse::from(stored),
        custom_instructions: instructions.into_iter().map(InstructionResponse::from).collect(),
        conversations: exported,
    }))
}

#[cfg(test)]
mod tests {
    use crate::build_router;
    use crate::db::handlers::{conversations::Conversations, instructions::CustomInstructions, messages::Messages};
    use crate::db::models::conversations::ConversationCreateDBRequest;
    use crate::db::models::instructions::InstructionCreateDBRequest;
    use crate::db::models::messages::{MessageCreateDBRequest, MessageRole};
    use crate::db::models::users::UserDBResponse;
    use crate::test_utils::{access_token_for, create_test_state_with_pool, create_test_user};
    use crate::AppState;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use sqlx::PgPool;

    fn server(pool: PgPool) -> (TestServer, AppState) {
        let state = create_test_state_with_pool(pool);
        let router = build_router(&state).expect("router should build");
        (TestServer::new(router).expect("test server"), state)
    }

    fn bearer(state: &AppState, user: &UserDBResponse) -> String {
        format!("Bearer {}", access_token_for(user, &state.config))
    }

    #[sqlx::test]
    async fn test_mutating_settings_requires_admin(pool: PgPool) {
        let (server, state) = server(pool.clone());
        let user = create_test_user(&pool, "diver", false).await;

        let response = server
            .post("/api/settings/system")
            .add_header("authorization", bearer(&state, &user))
            .json(&json!({"key": "site_name", "value": "Scuba"}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    async fn test_create_get_and_duplicate_key(pool: PgPool) {
        let (server, state) = server(pool.clone());
        let admin = create_test_user(&pool, "admin", true).await;
        let auth = bearer(&state, &admin);

        let response = server
            .post("/api/settings/system")
            .add_header("authorization", auth.clone())
            .json(&json!({"key": "site_name", "value": "Scuba"}))
            .await;
        response.assert_status(StatusCode::CREATED);

        let response = server
            .get("/api/settings/system/site_name")
            .add_header("authorization", auth.clone())
            .await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.json::<Value>()["value"], "Scuba");

        let response = server
            .get("/api/settings/system/missing_key")
            .add_header("authorization", auth.clone())
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        let response = server
            .post("/api/settings/system")
            .add_header("authorization", auth)
            .json(&json!({"key": "site_name", "value": "again"}))
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    async fn test_deleted_setting_disappears(pool: PgPool) {
        let (server, state) = server(pool.clone());
        let admin = create_test_user(&pool, "admin", true).await;
        let auth = bearer(&state, &admin);

        let created = server
            .post("/api/settings/system")
            .add_header("authorization", auth.clone())
            .json(&json!({"key": "maintenance_mode", "value": "on"}))
            .await
            .json::<Value>();
        let id = created["id"].as_str().unwrap().to_string();

        let response = server
            .delete(&format!("/api/settings/system/{id}"))
            .add_header("authorization", auth.clone())
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        let response = server
            .get("/api/settings/system/maintenance_mode")
            .add_header("authorization", auth.clone())
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        // A second delete, and an update of the vanished id, both 404.
        let response = server
            .delete(&format!("/api/settings/system/{id}"))
            .add_header("authorization", auth.clone())
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        let response = server
            .put(&format!("/api/settings/system/{id}"))
            .add_header("authorization", auth)
            .json(&json!({"value": "off"}))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    async fn test_preferences_reflect_the_default_instruction(pool: PgPool) {
        let (server, state) = server(pool.clone());
        let user = create_test_user(&pool, "diver", false).await;
        let auth = bearer(&state, &user);

        let response = server
            .get("/api/settings/preferences")
            .add_header("authorization", auth.clone())
            .await;
        response.assert_status(StatusCode::OK);
        assert!(response.json::<Value>()["default_custom_instruction"].is_null());

        let mut conn = pool.acquire().await.unwrap();
        CustomInstructions::new(&mut conn)
            .create(&InstructionCreateDBRequest {
                user_id: user.id,
                name: "haiku".to_string(),
                content: "Answer only in haiku.".to_string(),
                is_default: true,
            })
            .await
            .unwrap();

        let response = server
            .get("/api/settings/preferences")
            .add_header("authorization", auth)
            .await;
        let body = response.json::<Value>();
        assert_eq!(body["default_custom_instruction"]["name"], "haiku");
        assert_eq!(body["user"]["username"], "diver");
    }

    #[sqlx::test]
    async fn test_export_contains_only_own_data(pool: PgPool) {
        let (server, state) = server(pool.clone());
        let owner = create_test_user(&pool, "owner", false).await;
        let other = create_test_user(&pool, "other", false).await;

        let mut conn = pool.acquire().await.unwrap();
        let conversation = Conversations::new(&mut conn)
            .create(&ConversationCreateDBRequest {
                user_id: owner.id,
                title: "dive planning".to_string(),
            })
            .await
            .unwrap();
        for (role, content) in [(MessageRole::User, "how deep?"), (MessageRole::Assistant, "18 metres")] {
            Messages::new(&mut conn)
                .create(&MessageCreateDBRequest {
                    conversation_id: conversation.id,
                    role,
                    content: content.to_string(),
                })
                .await
                .unwrap();
        }
        CustomInstructions::new(&mut conn)
            .create(&InstructionCreateDBRequest {
                user_id: owner.id,
                name: "brief".to_string(),
                content: "Keep answers brief.".to_string(),
                is_default: false,
            })
            .await
            .unwrap();
        Conversations::new(&mut conn)
            .create(&ConversationCreateDBRequest {
                user_id: other.id,
                title: "someone else's chat".to_string(),
            })
            .await
            .unwrap();
        drop(conn);

        let response = server
            .get("/api/settings/export")
            .add_header("authorization", bearer(&state, &owner))
            .await;
        response.assert_status(StatusCode::OK);

        let body = response.json::<Value>();
        assert_eq!(body["user"]["username"], "owner");
        assert_eq!(body["custom_instructions"].as_array().unwrap().len(), 1);

        let conversations = body["conversations"].as_array().unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0]["title"], "dive planning");

        let messages = conversations[0]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["content"], "how deep?");
        assert_eq!(messages[1]["role"], "assistant");
    }
}
