//! Database repository for system settings.

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::settings::{SettingCreateDBRequest, SettingDBResponse, SettingUpdateDBRequest},
};
use crate::types::{abbrev_uuid, SettingId};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing system settings
#[derive(Debug, Clone, Default)]
pub struct SettingFilter {}

pub struct SystemSettings<'c> {
    db: &'c mut PgConnection,
}

impl<'c> SystemSettings<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_key(&mut self, key: &str) -> Result<Option<SettingDBResponse>> {
        let setting = sqlx::query_as::<_, SettingDBResponse>("SELECT * FROM system_settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(setting)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for SystemSettings<'c> {
    type CreateRequest = SettingCreateDBRequest;
    type UpdateRequest = SettingUpdateDBRequest;
    type Response = SettingDBResponse;
    type Id = SettingId;
    type Filter = SettingFilter;

    #[instrument(skip(self, request), fields(key = %request.key), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let setting = sqlx::query_as::<_, SettingDBResponse>(
            r#"
            INSERT INTO system_settings (id, key, value, description)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.key)
        .bind(&request.value)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(setting)
    }

    #[instrument(skip(self), fields(setting_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let setting = sqlx::query_as::<_, SettingDBResponse>("SELECT * FROM system_settings WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(setting)
    }

    #[instrument(skip(self), err)]
    async fn list(&mut self, _filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let settings = sqlx::query_as::<_, SettingDBResponse>("SELECT * FROM system_settings ORDER BY key ASC")
            .fetch_all(&mut *self.db)
            .await?;
        Ok(settings)
    }

    #[instrument(skip(self), fields(setting_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM system_settings WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(setting_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let setting = sqlx::query_as::<_, SettingDBResponse>(
            r#"
            UPDATE system_settings
            SET key = $2,
                value = $3,
                description = COALESCE($4, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.key)
        .bind(&request.value)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(setting)
    }
}
