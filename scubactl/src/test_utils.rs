//! Shared helpers for tests.

use crate::ai::{ChatCompletion, ChatMessage, ChatProvider, ModelInfo};
use crate::api::models::users::CurrentUser;
use crate::auth::session;
use crate::config::Config;
use crate::db::handlers::{repository::Repository, users::Users};
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse};
use crate::AppState;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

/// A [`ChatProvider`] that returns a canned reply without touching the network.
pub struct StaticChatProvider {
    pub reply: String,
    pub model: String,
}

impl Default for StaticChatProvider {
    fn default() -> Self {
        Self {
            reply: "canned reply".to_string(),
            model: "llama3-8b-8192".to_string(),
        }
    }
}

#[async_trait]
impl ChatProvider for StaticChatProvider {
    async fn complete(&self, _messages: &[ChatMessage]) -> anyhow::Result<ChatCompletion> {
        Ok(ChatCompletion {
            content: self.reply.clone(),
            model: self.model.clone(),
            usage: None,
        })
    }

    async fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo {
            id: self.model.clone(),
            owned_by: "test".to_string(),
            context_window: None,
        }])
    }
}

pub fn create_test_config() -> Config {
    Config {
        secret_key: Some("test-secret-key-for-sessions".to_string()),
        ..Default::default()
    }
}

/// App state backed by a lazily-connected pool; suitable for tests that never
/// hit the database (extractors, token handling, router shape).
pub fn create_test_state() -> AppState {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgresql://localhost/scubactl_test")
        .expect("lazy pool construction should not fail");

    create_test_state_with_pool(pool)
}

/// App state over a real pool, for `#[sqlx::test]` handler tests.
pub fn create_test_state_with_pool(pool: PgPool) -> AppState {
    AppState::builder()
        .db(pool)
        .config(create_test_config())
        .ai(Arc::new(StaticChatProvider::default()))
        .build()
}

/// Insert a user with a derived email and no password.
pub async fn create_test_user(pool: &PgPool, username: &str, is_admin: bool) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("acquire connection");
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            is_admin,
            password_hash: None,
        })
        .await
        .expect("create test user")
}

/// Mint an access token for a stored user.
pub fn access_token_for(user: &UserDBResponse, config: &Config) -> String {
    session::create_access_token(&CurrentUser::from(user), config).expect("create access token")
}
