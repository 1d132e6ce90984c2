// db/userdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::DBClient;
use crate::models::usermodel::User;

#[async_trait]
pub trait UserExt {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, Error>;

    async fn get_users_by_ids(&self, user_ids: &[Uuid]) -> Result<Vec<User>, Error>;

    /// Active admins; recipients of admin-inbox messages.
    async fn get_admin_ids(&self) -> Result<Vec<Uuid>, Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, role, status, is_verified, avatar_url,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_users_by_ids(&self, user_ids: &[Uuid]) -> Result<Vec<User>, Error> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, role, status, is_verified, avatar_url,
                   created_at, updated_at
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(user_ids.to_vec())
        .fetch_all(&self.pool)
        .await
    }

    async fn get_admin_ids(&self) -> Result<Vec<Uuid>, Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM users
            WHERE role = 'admin'::user_role
              AND status = 'active'::user_status
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}
