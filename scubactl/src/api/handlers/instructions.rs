//! Custom instruction handlers.
//!
//! Everything here is scoped to the requesting user. Default flips run in a
//! transaction: the partial unique index on `custom_instructions` only allows
//! one default per user, so the old default is cleared before the new one is
//! written.

use crate::api::models::instructions::{InstructionCreateRequest, InstructionResponse, InstructionUpdateRequest};
use crate::api::models::users::CurrentUser;
use crate::db::handlers::instructions::CustomInstructions;
use crate::db::models::instructions::{InstructionCreateDBRequest, InstructionUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::types::InstructionId;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

fn validate(name: &str, content: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Name cannot be empty".to_string(),
        });
    }
    if content.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Content cannot be empty".to_string(),
        });
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/settings/instructions",
    tag = "settings",
    summary = "List the current user's custom instructions",
    responses(
        (status = 200, description = "Custom instructions, newest first", body = Vec<InstructionResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_instructions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<InstructionResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let instructions = CustomInstructions::new(&mut conn).list_for_user(user.id).await?;
    Ok(Json(instructions.into_iter().map(InstructionResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/settings/instructions",
    tag = "settings",
    summary = "Create a custom instruction",
    request_body = InstructionCreateRequest,
    responses(
        (status = 201, description = "Instruction created", body = InstructionResponse),
        (status = 400, description = "Empty name or content"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_instruction(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<InstructionCreateRequest>,
) -> Result<(StatusCode, Json<InstructionResponse>)> {
    validate(&request.name, &request.content)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    if request.is_default {
        CustomInstructions::new(&mut tx).clear_default(user.id).await?;
    }
    let instruction = CustomInstructions::new(&mut tx)
        .create(&InstructionCreateDBRequest {
            user_id: user.id,
            name: request.name.trim().to_string(),
            content: request.content.trim().to_string(),
            is_default: request.is_default,
        })
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(InstructionResponse::from(instruction))))
}

#[utoipa::path(
    get,
    path = "/api/settings/instructions/{id}",
    tag = "settings",
    summary = "Get a custom instruction",
    params(("id" = Uuid, Path, description = "Instruction id")),
    responses(
        (status = 200, description = "Custom instruction", body = InstructionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Instruction not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, instruction_id = %id))]
pub async fn get_instruction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<InstructionId>,
) -> Result<Json<InstructionResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let instruction = CustomInstructions::new(&mut conn)
        .get_for_user(id, user.id)
        .await?
        .ok_or_else(|| Error::not_found("Custom instruction"))?;
    Ok(Json(InstructionResponse::from(instruction)))
}

#[utoipa::path(
    put,
    path = "/api/settings/instructions/{id}",
    tag = "settings",
    summary = "Update a custom instruction",
    params(("id" = Uuid, Path, description = "Instruction id")),
    request_body = InstructionUpdateRequest,
    responses(
        (status = 200, description = "Updated instruction", body = InstructionResponse),
        (status = 400, description = "Empty name or content"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Instruction not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, instruction_id = %id))]
pub async fn update_instruction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<InstructionId>,
    Json(request): Json<InstructionUpdateRequest>,
) -> Result<Json<InstructionResponse>> {
    validate(&request.name, &request.content)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    if request.is_default {
        CustomInstructions::new(&mut tx).clear_default(user.id).await?;
    }
    let instruction = CustomInstructions::new(&mut tx)
        .update_for_user(
            id,
            user.id,
            &InstructionUpdateDBRequest {
                name: request.name.trim().to_string(),
                content: request.content.trim().to_string(),
                is_default: request.is_default,
            },
        )
        .await?
        .ok_or_else(|| Error::not_found("Custom instruction"))?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(InstructionResponse::from(instruction)))
}

#[utoipa::path(
    delete,
    path = "/api/settings/instructions/{id}",
    tag = "settings",
    summary = "Delete a custom instruction",
    params(("id" = Uuid, Path, description = "Instruction id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Instruction not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, instruction_id = %id))]
pub async fn delete_instruction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<InstructionId>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let deleted = CustomInstructions::new(&mut conn).delete_for_user(id, user.id).await?;
    if !deleted {
        return Err(Error::not_found("Custom instruction"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/settings/instructions/{id}/set-default",
    tag = "settings",
    summary = "Make an instruction the default system prompt",
    params(("id" = Uuid, Path, description = "Instruction id")),
    responses(
        (status = 200, description = "Instruction is now the default", body = InstructionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Instruction not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, instruction_id = %id))]
pub async fn set_default_instruction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<InstructionId>,
) -> Result<Json<InstructionResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let existing = CustomInstructions::new(&mut tx)
        .get_for_user(id, user.id)
        .await?
        .ok_or_else(|| Error::not_found("Custom instruction"))?;

    CustomInstructions::new(&mut tx).clear_default(user.id).await?;
    let instruction = CustomInstructions::new(&mut tx)
        .update_for_user(
            id,
            user.id,
            &InstructionUpdateDBRequest {
                name: existing.name,
                content: existing.content,
                is_default: true,
            },
        )
        .await?
        .ok_or_else(|| Error::not_found("Custom instruction"))?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(InstructionResponse::from(instruction)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_router;
    use crate::db::models::users::UserDBResponse;
    use crate::test_utils::{access_token_for, create_test_state_with_pool, create_test_user};
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

    async fn seed_instruction(server: &TestServer, auth: &str, name: &str, is_default: bool) -> String {
        let response = server
            .post("/api/settings/instructions")
            .add_header("authorization", auth.to_string())
            .json(&json!({"name": name, "content": format!("{name} content"), "is_default": is_default}))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["id"].as_str().unwrap().to_string()
    }

    #[sqlx::test]
    async fn test_set_default_moves_the_flag(pool: PgPool) {
        let (server, state) = server(pool.clone());
        let user = create_test_user(&pool, "diver", false).await;
        let auth = bearer(&state, &user);

        seed_instruction(&server, &auth, "haiku", true).await;
        let second = seed_instruction(&server, &auth, "brief", false).await;

        let response = server
            .post(&format!("/api/settings/instructions/{second}/set-default"))
            .add_header("authorization", auth.clone())
            .await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.json::<Value>()["is_default"], true);

        let listed = server
            .get("/api/settings/instructions")
            .add_header("authorization", auth)
            .await
            .json::<Value>();
        for instruction in listed.as_array().unwrap() {
            let expected = instruction["id"] == second.as_str();
            assert_eq!(instruction["is_default"], expected, "only the promoted instruction is default");
        }
        assert_eq!(listed.as_array().unwrap().len(), 2);
    }

    #[sqlx::test]
    async fn test_creating_a_new_default_demotes_the_old_one(pool: PgPool) {
        let (server, state) = server(pool.clone());
        let user = create_test_user(&pool, "diver", false).await;
        let auth = bearer(&state, &user);

        let first = seed_instruction(&server, &auth, "haiku", true).await;
        seed_instruction(&server, &auth, "brief", true).await;

        let response = server
            .get(&format!("/api/settings/instructions/{first}"))
            .add_header("authorization", auth)
            .await;
        assert_eq!(response.json::<Value>()["is_default"], false);
    }

    #[sqlx::test]
    async fn test_instructions_are_private(pool: PgPool) {
        let (server, state) = server(pool.clone());
        let owner = create_test_user(&pool, "owner", false).await;
        let intruder = create_test_user(&pool, "intruder", false).await;

        let id = seed_instruction(&server, &bearer(&state, &owner), "private", false).await;

        let response = server
            .get(&format!("/api/settings/instructions/{id}"))
            .add_header("authorization", bearer(&state, &intruder))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
