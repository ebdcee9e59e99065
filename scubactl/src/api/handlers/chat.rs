//! Conversation and message handlers, including the Groq proxy turn.

use crate::ai::prepare_messages;
use crate::api::models::chat::{
    ConversationCreateRequest, ConversationDetailResponse, ConversationRenameRequest, ConversationResponse,
    MessageResponse, ModelsListResponse, SendMessageRequest, SendMessageResponse,
};
use crate::api::models::users::CurrentUser;
use crate::db::handlers::{
    conversations::Conversations, instructions::CustomInstructions, messages::Messages,
};
use crate::db::models::{
    conversations::ConversationCreateDBRequest,
    messages::{MessageCreateDBRequest, MessageRole},
};
use crate::errors::{Error, Result};
use crate::types::{ConversationId, MessageId};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

#[utoipa::path(
    get,
    path = "/api/chat/conversations",
    tag = "chat",
    summary = "List the current user's conversations",
    responses(
        (status = 200, description = "Conversations, most recently active first", body = Vec<ConversationResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_conversations(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ConversationResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let conversations = Conversations::new(&mut conn).list_for_user(user.id).await?;
    Ok(Json(conversations.into_iter().map(ConversationResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/chat/conversations",
    tag = "chat",
    summary = "Create a conversation",
    request_body = ConversationCreateRequest,
    responses(
        (status = 201, description = "Conversation created", body = ConversationResponse),
        (status = 400, description = "Empty title"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_conversation(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<ConversationCreateRequest>,
) -> Result<(StatusCode, Json<ConversationResponse>)> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(Error::BadRequest {
            message: "Title cannot be empty".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let conversation = Conversations::new(&mut conn)
        .create(&ConversationCreateDBRequest {
            user_id: user.id,
            title: title.to_string(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ConversationResponse::from(conversation))))
}

#[utoipa::path(
    get,
    path = "/api/chat/conversations/{id}",
    tag = "chat",
    summary = "Get a conversation with its messages",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation with messages in chronological order", body = ConversationDetailResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Conversation not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, conversation_id = %id))]
pub async fn get_conversation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<ConversationId>,
) -> Result<Json<ConversationDetailResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let conversation = Conversations::new(&mut conn)
        .get_for_user(id, user.id)
        .await?
        .ok_or_else(|| Error::not_found("Conversation"))?;
    let messages = Messages::new(&mut conn).list_for_conversation(id).await?;

    Ok(Json(ConversationDetailResponse {
        conversation: ConversationResponse::from(conversation),
        messages: messages.into_iter().map(MessageResponse::from).collect(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/chat/conversations/{id}/title",
    tag = "chat",
    summary = "Rename a conversation",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = ConversationRenameRequest,
    responses(
        (status = 200, description = "Renamed conversation", body = ConversationResponse),
        (status = 400, description = "Empty title"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Conversation not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, conversation_id = %id))]
pub async fn rename_conversation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<ConversationId>,
    Json(request): Json<ConversationRenameRequest>,
) -> Result<Json<ConversationResponse>> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(Error::BadRequest {
            message: "Title cannot be empty".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let conversation = Conversations::new(&mut conn)
        .rename_for_user(id, user.id, title)
        .await?
        .ok_or_else(|| Error::not_found("Conversation"))?;

    Ok(Json(ConversationResponse::from(conversation)))
}

#[utoipa::path(
    delete,
    path = "/api/chat/conversations/{id}",
    tag = "chat",
    summary = "Delete a conversation and its messages",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Conversation not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, conversation_id = %id))]
pub async fn delete_conversation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<ConversationId>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let deleted = Conversations::new(&mut conn).delete_for_user(id, user.id).await?;
    if !deleted {
        return Err(Error::not_found("Conversation"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/chat/conversations/{id}/messages",
    tag = "chat",
    summary = "Send a message and get the assistant's reply",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Both halves of the completed turn", body = SendMessageResponse),
        (status = 400, description = "Empty message"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Conversation or custom instruction not found"),
        (status = 502, description = "AI provider failure; nothing was persisted"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, conversation_id = %id))]
pub async fn send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<ConversationId>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>)> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(Error::BadRequest {
            message: "Message cannot be empty".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    Conversations::new(&mut conn)
        .get_for_user(id, user.id)
        .await?
        .ok_or_else(|| Error::not_found("Conversation"))?;

    let history = Messages::new(&mut conn).list_for_conversation(id).await?;

    // System prompt precedence: explicit per-request instruction, then the
    // user's default, then the built-in assistant prompt.
    let instruction = match request.custom_instruction_id {
        Some(instruction_id) => Some(
            CustomInstructions::new(&mut conn)
                .get_for_user(instruction_id, user.id)
                .await?
                .ok_or_else(|| Error::not_found("Custom instruction"))?,
        ),
        None => CustomInstructions::new(&mut conn).get_default_for_user(user.id).await?,
    };
    drop(conn);

    let context = prepare_messages(&history, content, instruction.as_ref().map(|i| i.content.as_str()));

    // The provider call happens before anything is written, so a failed turn
    // leaves the conversation untouched.
    let completion = state
        .ai
        .complete(&context)
        .await
        .map_err(|e| Error::Upstream { message: e.to_string() })?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let user_message = Messages::new(&mut tx)
        .create(&MessageCreateDBRequest {
            conversation_id: id,
            role: MessageRole::User,
            content: content.to_string(),
        })
        .await?;
    let assistant_message = Messages::new(&mut tx)
        .create(&MessageCreateDBRequest {
            conversation_id: id,
            role: MessageRole::Assistant,
            content: completion.content,
        })
        .await?;
    Conversations::new(&mut tx).touch(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            user_message: MessageResponse::from(user_message),
            assistant_message: MessageResponse::from(assistant_message),
            model: completion.model,
            usage: completion.usage,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/chat/conversations/{id}/messages/{message_id}",
    tag = "chat",
    summary = "Delete a single message",
    params(
        ("id" = Uuid, Path, description = "Conversation id"),
        ("message_id" = Uuid, Path, description = "Message id"),
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Conversation or message not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id, conversation_id = %id, message_id = %message_id))]
pub async fn delete_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, message_id)): Path<(ConversationId, MessageId)>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    Conversations::new(&mut conn)
        .get_for_user(id, user.id)
        .await?
        .ok_or_else(|| Error::not_found("Conversation"))?;

    let deleted = Messages::new(&mut conn).delete_for_conversation(message_id, id).await?;
    if !deleted {
        return Err(Error::not_found("Message"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/chat/models",
    tag = "chat",
    summary = "List models available from the AI provider",
    responses(
        (status = 200, description = "Available models", body = ModelsListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "AI provider failure"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_models(State(state): State<AppState>, user: CurrentUser) -> Result<Json<ModelsListResponse>> {
    let models = state
        .ai
        .list_models()
        .await
        .map_err(|e| Error::Upstream { message: e.to_string() })?;
    Ok(Json(ModelsListResponse { models }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ChatCompletion, ChatMessage, ChatProvider, ModelInfo};
    use crate::build_router;
    use crate::db::models::users::UserDBResponse;
    use crate::test_utils::{access_token_for, create_test_config, create_test_state_with_pool, create_test_user};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use sqlx::PgPool;
    use std::sync::Arc;

    /// Provider that fails every call, for exercising the 502 path.
    struct BrokenProvider;

    #[async_trait::async_trait]
    impl ChatProvider for BrokenProvider {
        async fn complete(&self, _messages: &[ChatMessage]) -> anyhow::Result<ChatCompletion> {
            Err(anyhow::anyhow!("upstream unavailable"))
        }

        async fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>> {
            Err(anyhow::anyhow!("upstream unavailable"))
        }
    }

    fn server(pool: PgPool) -> (TestServer, AppState) {
        let state = create_test_state_with_pool(pool);
        let router = build_router(&state).expect("router should build");
        (TestServer::new(router).expect("test server"), state)
    }

    fn bearer(state: &AppState, user: &UserDBResponse) -> String {
        format!("Bearer {}", access_token_for(user, &state.config))
    }

    async fn seed_conversation(server: &TestServer, auth: &str, title: &str) -> String {
        let response = server
            .post("/api/chat/conversations")
            .add_header("authorization", auth.to_string())
            .json(&json!({"title": title}))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["id"].as_str().unwrap().to_string()
    }

    #[sqlx::test]
    async fn test_send_message_persists_both_halves(pool: PgPool) {
        let (server, state) = server(pool.clone());
        let user = create_test_user(&pool, "diver", false).await;
        let auth = bearer(&state, &user);
        let conversation_id = seed_conversation(&server, &auth, "dive planning").await;

        let response = server
            .post(&format!("/api/chat/conversations/{conversation_id}/messages"))
            .add_header("authorization", auth.clone())
            .json(&json!({"content": "how deep is safe?"}))
            .await;
        response.assert_status(StatusCode::CREATED);

        let body = response.json::<Value>();
        assert_eq!(body["user_message"]["content"], "how deep is safe?");
        assert_eq!(body["assistant_message"]["content"], "canned reply");
        assert_eq!(body["assistant_message"]["role"], "assistant");

        let response = server
            .get(&format!("/api/chat/conversations/{conversation_id}"))
            .add_header("authorization", auth)
            .await;
        let messages = response.json::<Value>()["messages"].as_array().unwrap().clone();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
    }

    #[sqlx::test]
    async fn test_provider_failure_persists_nothing(pool: PgPool) {
        let broken = AppState::builder()
            .db(pool.clone())
            .config(create_test_config())
            .ai(Arc::new(BrokenProvider))
            .build();
        let server = TestServer::new(build_router(&broken).expect("router should build")).expect("test server");

        let user = create_test_user(&pool, "diver", false).await;
        let auth = bearer(&broken, &user);
        let conversation_id = seed_conversation(&server, &auth, "doomed turn").await;

        let response = server
            .post(&format!("/api/chat/conversations/{conversation_id}/messages"))
            .add_header("authorization", auth.clone())
            .json(&json!({"content": "anyone there?"}))
            .await;
        response.assert_status(StatusCode::BAD_GATEWAY);

        let response = server
            .get(&format!("/api/chat/conversations/{conversation_id}"))
            .add_header("authorization", auth)
            .await;
        assert!(response.json::<Value>()["messages"].as_array().unwrap().is_empty());
    }

    #[sqlx::test]
    async fn test_send_message_rejects_foreign_instruction(pool: PgPool) {
        let (server, state) = server(pool.clone());
        let user = create_test_user(&pool, "diver", false).await;
        let auth = bearer(&state, &user);
        let conversation_id = seed_conversation(&server, &auth, "chat").await;

        let response = server
            .post(&format!("/api/chat/conversations/{conversation_id}/messages"))
            .add_header("authorization", auth)
            .json(&json!({
                "content": "hello",
                "custom_instruction_id": uuid::Uuid::new_v4(),
            }))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    async fn test_delete_message_requires_owning_conversation(pool: PgPool) {
        let (server, state) = server(pool.clone());
        let owner = create_test_user(&pool, "owner", false).await;
        let intruder = create_test_user(&pool, "intruder", false).await;
        let auth = bearer(&state, &owner);
        let conversation_id = seed_conversation(&server, &auth, "private").await;

        let sent = server
            .post(&format!("/api/chat/conversations/{conversation_id}/messages"))
            .add_header("authorization", auth.clone())
            .json(&json!({"content": "secret"}))
            .await
            .json::<Value>();
        let message_id = sent["user_message"]["id"].as_str().unwrap().to_string();

        let response = server
            .delete(&format!("/api/chat/conversations/{conversation_id}/messages/{message_id}"))
            .add_header("authorization", bearer(&state, &intruder))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        let response = server
            .delete(&format!("/api/chat/conversations/{conversation_id}/messages/{message_id}"))
            .add_header("authorization", auth)
            .await;
        response.assert_status(StatusCode::NO_CONTENT);
    }
}
