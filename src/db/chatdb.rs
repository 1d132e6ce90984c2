// db/chatdb.rs
use async_trait::async_trait;
use sqlx::Error;

use super::DBClient;
use crate::models::chatmodel::*;

#[async_trait]
pub trait ChatExt {
    async fn create_message(&self, message: NewMessage) -> Result<Message, Error>;

    /// Every message the viewer sent or is addressed by, oldest first.
    async fn get_user_messages(&self, viewer: Viewer) -> Result<Vec<Message>, Error>;

    /// Pages count back from the newest message: offset 0 is the latest
    /// `limit` messages. Each page is returned oldest first.
    async fn get_thread_messages(
        &self,
        thread: ThreadKey,
        viewer: Viewer,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, Error>;

    /// Bulk read-state update for one thread. Returns the number of rows that
    /// flipped; zero on a repeated call.
    async fn mark_thread_read(&self, thread: ThreadKey, viewer: Viewer) -> Result<u64, Error>;

    async fn get_unread_message_count(&self, viewer: Viewer) -> Result<i64, Error>;
}

#[async_trait]
impl ChatExt for DBClient {
    async fn create_message(&self, message: NewMessage) -> Result<Message, Error> {
        sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (job_id, sender_id, receiver_id, message_type, content)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, seq, job_id, sender_id, receiver_id, message_type, content,
                      is_read, read_at, created_at
            "#,
        )
        .bind(message.job_id)
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(message.message_type)
        .bind(message.content)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_user_messages(&self, viewer: Viewer) -> Result<Vec<Message>, Error> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT id, seq, job_id, sender_id, receiver_id, message_type, content,
                   is_read, read_at, created_at
            FROM messages
            WHERE sender_id = $1
               OR receiver_id = $1
               OR ($2 AND receiver_id IS NULL AND job_id IS NULL)
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(viewer.id)
        .bind(viewer.is_admin())
        .fetch_all(&self.pool)
        .await
    }

    async fn get_thread_messages(
        &self,
        thread: ThreadKey,
        viewer: Viewer,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, Error> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT id, seq, job_id, sender_id, receiver_id, message_type, content,
                   is_read, read_at, created_at
            FROM (
                SELECT id, seq, job_id, sender_id, receiver_id, message_type, content,
                       is_read, read_at, created_at
                FROM messages
                WHERE job_id IS NOT DISTINCT FROM $1
                  AND (sender_id = $2 OR receiver_id = $2 OR ($3 AND receiver_id IS NULL))
                ORDER BY created_at DESC, seq DESC
                LIMIT $4 OFFSET $5
            ) recent
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(thread.job_id())
        .bind(viewer.id)
        .bind(viewer.is_admin())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn mark_thread_read(&self, thread: ThreadKey, viewer: Viewer) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = true, read_at = NOW()
            WHERE job_id IS NOT DISTINCT FROM $1
              AND is_read = false
              AND sender_id <> $2
              AND (receiver_id = $2 OR ($3 AND receiver_id IS NULL))
            "#,
        )
        .bind(thread.job_id())
        .bind(viewer.id)
        .bind(viewer.is_admin())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_unread_message_count(&self, viewer: Viewer) -> Result<i64, Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM messages
            WHERE is_read = false
              AND sender_id <> $1
              AND (receiver_id = $1 OR ($2 AND receiver_id IS NULL))
            "#,
        )
        .bind(viewer.id)
        .bind(viewer.is_admin())
        .fetch_one(&self.pool)
        .await
    }
}
