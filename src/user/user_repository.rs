use crate::error::Result;
use sqlx::PgPool;

use super::user_models::User;

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the account, or refreshes its profile if the subject already exists.
    pub async fn upsert(&self, id: &str, email: &str, username: Option<&str>) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, username)
             VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                username = COALESCE(EXCLUDED.username, users.username),
                updated_at = NOW()
             RETURNING *",
        )
        .bind(id)
        .bind(email)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn update(
        &self,
        id: &str,
        email: Option<&str>,
        username: Option<&str>,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET
                email = COALESCE($1, email),
                username = COALESCE($2, username),
                updated_at = NOW()
             WHERE id = $3
             RETURNING *",
        )
        .bind(email)
        .bind(username)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Plants, push tokens and notifications go with the account (ON DELETE CASCADE).
    pub async fn delete(&self, id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
