//! Database repository for conversations.
//!
//! All reads and writes are scoped to the owning user, so a caller can never
//! touch another user's conversations by guessing IDs.

use crate::db::{
    errors::Result,
    models::conversations::{ConversationCreateDBRequest, ConversationDBResponse},
};
use crate::types::{abbrev_uuid, ConversationId, UserId};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct Conversations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Conversations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    pub async fn create(&mut self, request: &ConversationCreateDBRequest) -> Result<ConversationDBResponse> {
        let conversation = sqlx::query_as::<_, ConversationDBResponse>(
            r#"
            INSERT INTO conversations (id, user_id, title)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(&request.title)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(conversation)
    }

    #[instrument(skip(self), fields(conversation_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_user(
        &mut self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Option<ConversationDBResponse>> {
        let conversation = sqlx::query_as::<_, ConversationDBResponse>(
            "SELECT * FROM conversations WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(conversation)
    }

    /// List a user's conversations, most recently active first.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_for_user(&mut self, user_id: UserId) -> Result<Vec<ConversationDBResponse>> {
        let conversations = sqlx::query_as::<_, ConversationDBResponse>(
            "SELECT * FROM conversations WHERE user_id = $1 ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(conversations)
    }

    #[instrument(skip(self), fields(conversation_id = %abbrev_uuid(&id)), err)]
    pub async fn rename_for_user(
        &mut self,
        id: ConversationId,
        user_id: UserId,
        title: &str,
    ) -> Result<Option<ConversationDBResponse>> {
        let conversation = sqlx::query_as::<_, ConversationDBResponse>(
            r#"
            UPDATE conversations
            SET title = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(title)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(conversation)
    }

    /// Bump `updated_at` so the conversation sorts to the top of the sidebar.
    #[instrument(skip(self), fields(conversation_id = %abbrev_uuid(&id)), err)]
    pub async fn touch(&mut self, id: ConversationId) -> Result<()> {
        sqlx::query("UPDATE conversations SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    /// Delete a conversation and (via cascade) its messages.
    #[instrument(skip(self), fields(conversation_id = %abbrev_uuid(&id)), err)]
    pub async fn delete_for_user(&mut self, id: ConversationId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1 AND user_id = $2")
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
    use crate::db::handlers::messages::Messages;
    use crate::db::models::messages::{MessageCreateDBRequest, MessageRole};
    use crate::test_utils::create_test_user;
    use sqlx::PgPool;

    async fn seed_conversation(pool: &PgPool, user_id: UserId, title: &str) -> ConversationDBResponse {
        let mut conn = pool.acquire().await.unwrap();
        Conversations::new(&mut conn)
            .create(&ConversationCreateDBRequest {
                user_id,
                title: title.to_string(),
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_orders_by_recent_activity(pool: PgPool) {
        let user = create_test_user(&pool, "diver", false).await;
        let first = seed_conversation(&pool, user.id, "first").await;
        let second = seed_conversation(&pool, user.id, "second").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Conversations::new(&mut conn);

        let listed = repo.list_for_user(user.id).await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);

        // Activity on the older conversation moves it back to the front.
        repo.touch(first.id).await.unwrap();
        let listed = repo.list_for_user(user.id).await.unwrap();
        assert_eq!(listed[0].id, first.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_scoped_to_owner(pool: PgPool) {
        let owner = create_test_user(&pool, "owner", false).await;
        let intruder = create_test_user(&pool, "intruder", false).await;
        let conversation = seed_conversation(&pool, owner.id, "private").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Conversations::new(&mut conn);

        assert!(repo.get_for_user(conversation.id, intruder.id).await.unwrap().is_none());
        assert!(repo
            .rename_for_user(conversation.id, intruder.id, "stolen")
            .await
            .unwrap()
            .is_none());
        assert!(!repo.delete_for_user(conversation.id, intruder.id).await.unwrap());

        let untouched = repo.get_for_user(conversation.id, owner.id).await.unwrap().unwrap();
        assert_eq!(untouched.title, "private");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_cascades_to_messages(pool: PgPool) {
        let user = create_test_user(&pool, "diver", false).await;
        let conversation = seed_conversation(&pool, user.id, "doomed").await;

        let mut conn = pool.acquire().await.unwrap();
        Messages::new(&mut conn)
            .create(&MessageCreateDBRequest {
                conversation_id: conversation.id,
                role: MessageRole::User,
                content: "hello".to_string(),
            })
            .await
            .unwrap();

        assert!(Conversations::new(&mut conn)
            .delete_for_user(conversation.id, user.id)
            .await
            .unwrap());

        let orphans = Messages::new(&mut conn)
            .list_for_conversation(conversation.id)
            .await
            .unwrap();
        assert!(orphans.is_empty());
    }
}
