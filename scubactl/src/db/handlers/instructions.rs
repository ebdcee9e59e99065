//! Database repository for custom instructions.
//!
//! A partial unique index guarantees at most one default instruction per user,
//! so setting a new default must first clear the old one. Callers that flip
//! defaults should run inside a transaction; [`CustomInstructions::clear_default`]
//! is exposed for that purpose.

use crate::db::{
    errors::Result,
    models::instructions::{
        InstructionCreateDBRequest, InstructionDBResponse, InstructionUpdateDBRequest,
    },
};
use crate::types::{abbrev_uuid, InstructionId, UserId};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct CustomInstructions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> CustomInstructions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    pub async fn create(&mut self, request: &InstructionCreateDBRequest) -> Result<InstructionDBResponse> {
        let instruction = sqlx::query_as::<_, InstructionDBResponse>(
            r#"
            INSERT INTO custom_instructions (id, user_id, name, content, is_default)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(&request.name)
        .bind(&request.content)
        .bind(request.is_default)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(instruction)
    }

    #[instrument(skip(self), fields(instruction_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_user(
        &mut self,
        id: InstructionId,
        user_id: UserId,
    ) -> Result<Option<InstructionDBResponse>> {
        let instruction = sqlx::query_as::<_, InstructionDBResponse>(
            "SELECT * FROM custom_instructions WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(instruction)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_for_user(&mut self, user_id: UserId) -> Result<Vec<InstructionDBResponse>> {
        let instructions = sqlx::query_as::<_, InstructionDBResponse>(
            "SELECT * FROM custom_instructions WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(instructions)
    }

    /// The instruction used as the system prompt for new chat turns, if any.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_default_for_user(&mut self, user_id: UserId) -> Result<Option<InstructionDBResponse>> {
        let instruction = sqlx::query_as::<_, InstructionDBResponse>(
            "SELECT * FROM custom_instructions WHERE user_id = $1 AND is_default",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(instruction)
    }

    /// Unset the current default for a user. Must run in the same transaction
    /// as the statement that promotes the new default, or the partial unique
    /// index will reject the promotion.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn clear_default(&mut self, user_id: UserId) -> Result<()> {
        sqlx::query("UPDATE custom_instructions SET is_default = FALSE, updated_at = NOW() WHERE user_id = $1 AND is_default")
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(instruction_id = %abbrev_uuid(&id)), err)]
    pub async fn update_for_user(
        &mut self,
        id: InstructionId,
        user_id: UserId,
        request: &InstructionUpdateDBRequest,
    ) -> Result<Option<InstructionDBResponse>> {
        let instruction = sqlx::query_as::<_, InstructionDBResponse>(
            r#"
            UPDATE custom_instructions
            SET name = $3, content = $4, is_default = $5, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&request.name)
        .bind(&request.content)
        .bind(request.is_default)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(instruction)
    }

    #[instrument(skip(self), fields(instruction_id = %abbrev_uuid(&id)), err)]
    pub async fn delete_for_user(&mut self, id: InstructionId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM custom_instructions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::DbError;
    use crate::test_utils::create_test_user;
    use sqlx::PgPool;

    fn request(user_id: UserId, name: &str, is_default: bool) -> InstructionCreateDBRequest {
        InstructionCreateDBRequest {
            user_id,
            name: name.to_string(),
            content: format!("{name} content"),
            is_default,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_no_default_until_one_is_set(pool: PgPool) {
        let user = create_test_user(&pool, "diver", false).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = CustomInstructions::new(&mut conn);

        repo.create(&request(user.id, "haiku", false)).await.unwrap();
        assert!(repo.get_default_for_user(user.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_second_default_is_rejected_without_clearing(pool: PgPool) {
        let user = create_test_user(&pool, "diver", false).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = CustomInstructions::new(&mut conn);

        repo.create(&request(user.id, "first", true)).await.unwrap();
        let err = repo.create(&request(user.id, "second", true)).await.unwrap_err();

        match err {
            DbError::UniqueViolation { constraint, .. } => {
                assert_eq!(constraint.as_deref(), Some("custom_instructions_one_default_per_user"));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_clear_then_set_flips_the_default(pool: PgPool) {
        let user = create_test_user(&pool, "diver", false).await;

        let mut conn = pool.acquire().await.unwrap();
        CustomInstructions::new(&mut conn)
            .create(&request(user.id, "first", true))
            .await
            .unwrap();
        drop(conn);

        let mut tx = pool.begin().await.unwrap();
        let mut repo = CustomInstructions::new(&mut tx);
        repo.clear_default(user.id).await.unwrap();
        let promoted = repo.create(&request(user.id, "second", true)).await.unwrap();
        tx.commit().await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let default = CustomInstructions::new(&mut conn)
            .get_default_for_user(user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(default.id, promoted.id);
        assert_eq!(default.name, "second");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_defaults_are_per_user(pool: PgPool) {
        let alice = create_test_user(&pool, "alice", false).await;
        let bob = create_test_user(&pool, "bob", false).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = CustomInstructions::new(&mut conn);

        // One default each commits fine; the index is keyed on user_id.
        repo.create(&request(alice.id, "alice default", true)).await.unwrap();
        repo.create(&request(bob.id, "bob default", true)).await.unwrap();

        let alices = repo.get_default_for_user(alice.id).await.unwrap().unwrap();
        assert_eq!(alices.name, "alice default");
    }
}
