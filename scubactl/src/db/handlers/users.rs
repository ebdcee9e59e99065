//! Database repository for users.

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::types::{abbrev_uuid, UserId};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

impl Default for UserFilter {
    fn default() -> Self {
        Self::new(0, 100)
    }
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Look up a user by username. Used by the login flow.
    #[instrument(skip(self), err)]
    pub async fn get_by_username(&mut self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(user)
    }

    /// Look up a user by email. Registration uses this alongside
    /// [`Users::get_by_username`] to report which field collides.
    #[instrument(skip(self), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(user)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            INSERT INTO users (id, username, email, is_admin, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.username)
        .bind(&request.email)
        .bind(request.is_admin)
        .bind(&request.password_hash)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, UserDBResponse>(
            "SELECT * FROM users ORDER BY created_at ASC OFFSET $1 LIMIT $2",
        )
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(users)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                password_hash = COALESCE($3, password_hash),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.email)
        .bind(&request.password_hash)
        .bind(request.is_active)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }
}
