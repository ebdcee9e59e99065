//! Database repository for chat messages.

use crate::db::{
    errors::Result,
    models::messages::{MessageCreateDBRequest, MessageDBResponse},
};
use crate::types::{abbrev_uuid, ConversationId, MessageId};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct Messages<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Messages<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(conversation_id = %abbrev_uuid(&request.conversation_id)), err)]
    pub async fn create(&mut self, request: &MessageCreateDBRequest) -> Result<MessageDBResponse> {
        let message = sqlx::query_as::<_, MessageDBResponse>(
            r#"
            INSERT INTO messages (id, conversation_id, role, content)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.conversation_id)
        .bind(request.role)
        .bind(&request.content)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(message)
    }

    /// Delete a message, scoped to its conversation so callers can't reach
    /// into other conversations by message id.
    #[instrument(skip(self), fields(message_id = %abbrev_uuid(&id)), err)]
    pub async fn delete_for_conversation(
        &mut self,
        id: MessageId,
        conversation_id: ConversationId,
    ) -> Result<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1 AND conversation_id = $2")
            .bind(id)
            .bind(conversation_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Full history of a conversation in chronological order.
    #[instrument(skip(self), fields(conversation_id = %abbrev_uuid(&conversation_id)), err)]
    pub async fn list_for_conversation(
        &mut self,
        conversation_id: ConversationId,
    ) -> Result<Vec<MessageDBResponse>> {
        let messages = sqlx::query_as::<_, MessageDBResponse>(
            "SELECT * FROM messages WHERE conversation_id = $1 ORDER BY created_at ASC",
        )
        .bind(conversation_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::conversations::Conversations;
    use crate::db::models::conversations::ConversationCreateDBRequest;
    use crate::db::models::messages::MessageRole;
    use crate::test_utils::create_test_user;
    use sqlx::PgPool;

    async fn seed_conversation(pool: &PgPool, username: &str) -> ConversationId {
        let user = create_test_user(pool, username, false).await;
        let mut conn = pool.acquire().await.unwrap();
        Conversations::new(&mut conn)
            .create(&ConversationCreateDBRequest {
                user_id: user.id,
                title: "chat".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    async fn seed_message(pool: &PgPool, conversation_id: ConversationId, role: MessageRole, content: &str) -> MessageId {
        let mut conn = pool.acquire().await.unwrap();
        Messages::new(&mut conn)
            .create(&MessageCreateDBRequest {
                conversation_id,
                role,
                content: content.to_string(),
            })
            .await
            .unwrap()
            .id
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_history_is_chronological(pool: PgPool) {
        let conversation_id = seed_conversation(&pool, "diver").await;
        seed_message(&pool, conversation_id, MessageRole::User, "how deep is safe?").await;
        seed_message(&pool, conversation_id, MessageRole::Assistant, "depends on training").await;
        seed_message(&pool, conversation_id, MessageRole::User, "for a beginner").await;

        let mut conn = pool.acquire().await.unwrap();
        let history = Messages::new(&mut conn)
            .list_for_conversation(conversation_id)
            .await
            .unwrap();

        assert_eq!(history.len(), 3);
        assert_eq!(history[0].content, "how deep is safe?");
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert_eq!(history[2].content, "for a beginner");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_is_scoped_to_conversation(pool: PgPool) {
        let home = seed_conversation(&pool, "owner").await;
        let other = seed_conversation(&pool, "neighbour").await;
        let message_id = seed_message(&pool, home, MessageRole::User, "hello").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Messages::new(&mut conn);

        assert!(!repo.delete_for_conversation(message_id, other).await.unwrap());
        assert_eq!(repo.list_for_conversation(home).await.unwrap().len(), 1);

        assert!(repo.delete_for_conversation(message_id, home).await.unwrap());
        assert!(repo.list_for_conversation(home).await.unwrap().is_empty());
    }
}
